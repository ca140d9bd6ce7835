//! Tagged-text output.
//!
//! One element per node, tag = node name, no attributes. Output reflects the
//! in-memory state whether or not it is valid.

use std::{fs, path::Path, time::SystemTime};

use quick_xml::escape::escape;

use crate::{
    data::{
        context::ConfigContext,
        fork::ForkStore,
        node::{NestedKind, NodeId, NodeKind},
    },
    error::Result,
};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

impl<F: ForkStore> ConfigContext<F> {
    /// Serialize the subtree at `id`, each line prefixed with `indent`.
    ///
    /// Structural nodes nest their children one indentation unit deeper;
    /// a choice writes only its selected element and a multi-valued node
    /// writes its items side by side without a wrapper. Forked references
    /// write the shared node's current state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NodeNotFound`] for stale ids.
    pub fn emit(&self, id: NodeId, indent: &str) -> Result<String> {
        let mut out = String::new();
        self.write_node(id, &mut out, indent)?;
        Ok(out)
    }

    fn write_node(&self, id: NodeId, out: &mut String, indent: &str) -> Result<()> {
        let node = self.arena.node(id)?;
        let name = node.name.as_str();
        match &node.kind {
            NodeKind::Value(_) => {
                out.push_str(&format!(
                    "{indent}<{name}>{}</{name}>\n",
                    escape(node.content.as_str())
                ));
            }
            NodeKind::Forked(_) => match self.resolve(id) {
                Ok(shared) => self.write_node(shared, out, indent)?,
                Err(_) => out.push_str(&format!("{indent}<{name}></{name}>\n")),
            },
            NodeKind::Nested {
                kind: NestedKind::MultiValued { .. },
                children,
            } => {
                for item in children {
                    self.write_node(*item, out, indent)?;
                }
            }
            NodeKind::Nested { kind, children } => {
                let inner = format!("{indent}{}", self.options.indent);
                out.push_str(&format!("{indent}<{name}>\n"));
                for child in children {
                    if *kind == NestedKind::Choice
                        && self.arena.get(*child).is_none_or(|c| c.name != node.content)
                    {
                        continue;
                    }
                    self.write_node(*child, out, &inner)?;
                }
                out.push_str(&format!("{indent}</{name}>\n"));
            }
        }
        Ok(())
    }

    /// Write the tree at `root` to `path` as an XML document.
    ///
    /// An existing file is first copied to a timestamped backup next to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or the write fails.
    pub fn save(&self, root: NodeId, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut doc = String::from(XML_DECLARATION);
        doc.push_str(&self.emit(root, "")?);

        if path.exists() {
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("xml");
            let secs = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            let backup = path.with_extension(format!("bk-{secs}.{ext}"));
            fs::copy(path, &backup)?;
            debug!("backed up {} to {}", path.display(), backup.display());
        }
        fs::write(path, doc)?;
        info!("saved configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{ConfigContext, xml};

    const SCHEMA: &str = r#"
        <BRANCH name="exp">
            <STRING-VALUE name="title" default="a &lt; b"/>
            <CHOICE name="algo" default="adam">
                <CHOICE-ELEMENT name="sgd"><DOUBLE-VALUE name="momentum" default="0.9"/></CHOICE-ELEMENT>
                <CHOICE-ELEMENT name="adam"><DOUBLE-VALUE name="beta" default="0.99"/></CHOICE-ELEMENT>
            </CHOICE>
            <MULTI-VALUED name="layer" min-items="2">
                <INTEGER-VALUE name="size" default="16"/>
            </MULTI-VALUED>
        </BRANCH>"#;

    #[test]
    fn test_emit_layout() {
        let mut ctx = ConfigContext::default();
        let root = ctx
            .build(&Arc::new(xml::parse(SCHEMA).unwrap()), None)
            .unwrap();
        let expected = "\
<exp>
  <title>a &lt; b</title>
  <algo>
    <adam>
      <beta>0.99</beta>
    </adam>
  </algo>
  <layer>
    <size>16</size>
  </layer>
  <layer>
    <size>16</size>
  </layer>
</exp>
";
        assert_eq!(ctx.emit(root, "").unwrap(), expected);
    }

    #[test]
    fn test_emit_with_left_indent() {
        let mut ctx = ConfigContext::default();
        let schema = r#"<BRANCH name="b"><INTEGER-VALUE name="n" default="x"/></BRANCH>"#;
        let root = ctx
            .build(&Arc::new(xml::parse(schema).unwrap()), None)
            .unwrap();
        assert!(!ctx.is_valid(root).unwrap());
        assert_eq!(ctx.emit(root, "    ").unwrap(), "    <b>\n      <n>x</n>\n    </b>\n");
    }

    #[test]
    fn test_save_backs_up_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exp.xml");
        std::fs::write(&target, "old").unwrap();

        let mut ctx = ConfigContext::default();
        let root = ctx
            .build(&Arc::new(xml::parse(SCHEMA).unwrap()), None)
            .unwrap();
        ctx.save(root, &target).unwrap();

        let saved = std::fs::read_to_string(&target).unwrap();
        assert!(saved.starts_with("<?xml"));
        assert!(saved.contains("<title>a &lt; b</title>"));
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("bk-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).unwrap(), "old");
    }
}
