//! Schema-driven node construction.
//!
//! The factory walks a schema subtree and, in lockstep, the matching part of
//! an optional prior-value tree. Every level falls back to schema defaults on
//! its own, so a partial saved configuration fills whatever it names.

use std::sync::Arc;

use crate::{
    data::{
        arena::NodeArena,
        fork::ForkStore,
        node::{ConfigNode, NestedKind, NodeId, NodeKind},
        tags::{self, Tag},
        value::ValueKind,
    },
    error::{Error, Result},
    options::{BuildOptions, UnknownTagPolicy},
    xml::Element,
};

/// Builds config nodes into an arena.
pub struct NodeFactory<'a> {
    arena: &'a mut NodeArena,
    forks: &'a mut dyn ForkStore,
    options: &'a BuildOptions,
    skipped: &'a mut Vec<String>,
    intercept_forks: bool,
}

impl<'a> NodeFactory<'a> {
    /// Create a factory writing into `arena`.
    ///
    /// `skipped` collects the positions of schema elements omitted under
    /// [`UnknownTagPolicy::Skip`].
    pub fn new(
        arena: &'a mut NodeArena,
        forks: &'a mut dyn ForkStore,
        options: &'a BuildOptions,
        skipped: &'a mut Vec<String>,
    ) -> Self {
        Self {
            arena,
            forks,
            options,
            skipped,
            intercept_forks: true,
        }
    }

    /// Disable fork interception, so shared positions are built as ordinary
    /// nodes. Used for clones.
    pub fn without_forks(mut self) -> Self {
        self.intercept_forks = false;
        self
    }

    /// Build a tree root.
    ///
    /// `prior` is the root element of a saved configuration; it is used when
    /// its tag matches the schema root's name.
    ///
    /// # Errors
    ///
    /// Returns an error for nameless elements, and for unknown tags under
    /// [`UnknownTagPolicy::Reject`].
    pub fn build_root(
        &mut self,
        schema: &Arc<Element>,
        prior: Option<&Element>,
    ) -> Result<Option<NodeId>> {
        let own = prior.filter(|p| schema.attr(tags::ATTR_NAME) == Some(p.tag.as_str()));
        self.instantiate(schema, None, "", own, None)
    }

    /// Build a node at a detached position below `parent_path`, without
    /// attaching it to any parent and without prior values.
    ///
    /// # Errors
    ///
    /// See [`NodeFactory::build_root`].
    pub fn build_detached(
        &mut self,
        schema: &Arc<Element>,
        parent_path: &str,
    ) -> Result<Option<NodeId>> {
        self.instantiate(schema, None, parent_path, None, None)
    }

    /// Build the child `schema` of `parent`.
    ///
    /// `parent_prior` is the parent's own prior-value element. If a live
    /// fork covers the child's position, a forked reference is built instead.
    ///
    /// # Errors
    ///
    /// See [`NodeFactory::build_root`].
    pub fn build_child(
        &mut self,
        schema: &Arc<Element>,
        parent: NodeId,
        parent_path: &str,
        parent_prior: Option<&Element>,
    ) -> Result<Option<NodeId>> {
        if self.intercept_forks
            && let Some(name) = schema.attr(tags::ATTR_NAME)
        {
            let position = format!("{parent_path}/{name}");
            if let Some(fork) = self.forks.lookup(&position) {
                let node = ConfigNode::new(
                    schema.clone(),
                    name.to_string(),
                    Some(parent),
                    parent_path,
                    NodeKind::Forked(fork),
                );
                let id = self.arena.insert(node);
                self.forks.attach(fork, id);
                debug!("{position} is shared through {fork}");
                return Ok(Some(id));
            }
        }

        let own = parent_prior
            .zip(schema.attr(tags::ATTR_NAME))
            .and_then(|(p, name)| p.child(name))
            .map(|c| &**c);
        self.instantiate(schema, Some(parent), parent_path, own, parent_prior)
    }

    /// Build one item of the multi-valued node `multi` from its schema.
    ///
    /// # Errors
    ///
    /// See [`NodeFactory::build_root`].
    pub fn build_item(
        &mut self,
        schema: &Arc<Element>,
        multi: NodeId,
        prior: Option<&Element>,
    ) -> Result<NodeId> {
        let multi_node = self.arena.node(multi)?;
        let name = multi_node.name.clone();
        let multi_path = multi_node.path.clone();
        self.item(schema, name, Some(multi), &multi_path, prior)
    }

    /// Build a multi-valued item at a detached position, without prior
    /// values.
    ///
    /// # Errors
    ///
    /// See [`NodeFactory::build_root`].
    pub fn build_detached_item(
        &mut self,
        schema: &Arc<Element>,
        name: &str,
        parent_path: &str,
    ) -> Result<NodeId> {
        self.item(schema, name.to_string(), None, parent_path, None)
    }

    fn item(
        &mut self,
        schema: &Arc<Element>,
        name: String,
        parent: Option<NodeId>,
        parent_path: &str,
        prior: Option<&Element>,
    ) -> Result<NodeId> {
        let mut node = ConfigNode::new(
            schema.clone(),
            name,
            parent,
            parent_path,
            NodeKind::Nested {
                kind: NestedKind::MultiItem,
                children: Vec::new(),
            },
        );
        node.from_default = prior.is_none();
        let id = self.arena.insert(node);
        self.build_children(schema, id, prior)?;
        Ok(id)
    }

    fn instantiate(
        &mut self,
        schema: &Arc<Element>,
        parent: Option<NodeId>,
        parent_path: &str,
        own_prior: Option<&Element>,
        parent_prior: Option<&Element>,
    ) -> Result<Option<NodeId>> {
        let Some(tag) = Tag::from_tag(&schema.tag) else {
            return self.unknown(schema, parent_path);
        };
        let name = node_name(schema, parent_path)?;

        if let Some(value) = ValueKind::from_schema(tag, schema) {
            let mut node = ConfigNode::new(
                schema.clone(),
                name,
                parent,
                parent_path,
                NodeKind::Value(value),
            );
            match own_prior {
                Some(p) => node.content = p.text.clone(),
                None => {
                    node.content = node.default_value.clone();
                    node.from_default = true;
                }
            }
            return Ok(Some(self.arena.insert(node)));
        }

        let kind = nested_kind(tag, schema);
        let node = ConfigNode::new(
            schema.clone(),
            name.clone(),
            parent,
            parent_path,
            NodeKind::Nested {
                kind,
                children: Vec::new(),
            },
        );
        let id = self.arena.insert(node);

        match kind {
            NestedKind::MultiValued { min_items } => {
                let priors: Vec<&Arc<Element>> = parent_prior
                    .map(|p| p.children_named(&name).collect())
                    .unwrap_or_default();
                let mut items = Vec::new();
                if priors.is_empty() {
                    for _ in 0..min_items {
                        items.push(self.build_item(schema, id, None)?);
                    }
                } else {
                    for prior in priors {
                        items.push(self.build_item(schema, id, Some(&**prior))?);
                    }
                }
                self.set_children(id, items)?;
            }
            NestedKind::Choice => {
                self.build_children(schema, id, own_prior)?;
                self.select_initial(id, own_prior)?;
            }
            _ => self.build_children(schema, id, own_prior)?,
        }
        Ok(Some(id))
    }

    fn build_children(
        &mut self,
        schema: &Arc<Element>,
        id: NodeId,
        own_prior: Option<&Element>,
    ) -> Result<()> {
        let path = self.arena.node(id)?.path.clone();
        let mut children = Vec::with_capacity(schema.children.len());
        for child in &schema.children {
            if let Some(child_id) = self.build_child(child, id, &path, own_prior)? {
                children.push(child_id);
            }
        }
        self.set_children(id, children)
    }

    fn set_children(&mut self, id: NodeId, new: Vec<NodeId>) -> Result<()> {
        let node = self.arena.node_mut(id)?;
        let path = node.path.clone();
        let children = node.children_mut().ok_or(Error::NotNested { path })?;
        *children = new;
        Ok(())
    }

    /// Initial choice selection: saved selection, then default, then the
    /// first element.
    fn select_initial(&mut self, id: NodeId, own_prior: Option<&Element>) -> Result<()> {
        let names: Vec<String> = self
            .arena
            .node(id)?
            .children()
            .iter()
            .filter_map(|c| self.arena.get(*c).map(|n| n.name.clone()))
            .collect();

        let saved = own_prior.and_then(|p| {
            p.children
                .iter()
                .find(|c| names.contains(&c.tag))
                .map(|c| c.tag.clone())
        });

        let node = self.arena.node_mut(id)?;
        match saved {
            Some(selected) => node.content = selected,
            None => {
                node.content = if node.default_value.is_empty() {
                    names.first().cloned().unwrap_or_default()
                } else {
                    node.default_value.clone()
                };
                node.from_default = true;
            }
        }
        Ok(())
    }

    fn unknown(&mut self, schema: &Element, parent_path: &str) -> Result<Option<NodeId>> {
        let name = schema.attr(tags::ATTR_NAME).unwrap_or_default().to_string();
        match self.options.unknown_tags {
            UnknownTagPolicy::Reject => Err(Error::UnknownTag {
                tag: schema.tag.clone(),
                name,
                parent: display_parent(parent_path),
            }),
            UnknownTagPolicy::Skip => {
                let position = format!("{parent_path}/{name}");
                warn!("skipping <{}> at {position}", schema.tag);
                self.skipped.push(position);
                Ok(None)
            }
        }
    }
}

fn nested_kind(tag: Tag, schema: &Element) -> NestedKind {
    match tag {
        Tag::Choice => NestedKind::Choice,
        Tag::ChoiceElement => NestedKind::ChoiceElement,
        Tag::MultiValued => NestedKind::MultiValued {
            min_items: schema
                .attr(tags::ATTR_MIN_ITEMS)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1),
        },
        _ => NestedKind::Branch,
    }
}

fn node_name(schema: &Element, parent_path: &str) -> Result<String> {
    match schema.attr(tags::ATTR_NAME) {
        None | Some("") => Err(Error::MissingName {
            tag: schema.tag.clone(),
            parent: display_parent(parent_path),
        }),
        Some(name) if name.contains('/') || name.chars().any(char::is_whitespace) => {
            Err(Error::InvalidName {
                name: name.to_string(),
                parent: display_parent(parent_path),
            })
        }
        Some(name) => Ok(name.to_string()),
    }
}

fn display_parent(parent_path: &str) -> String {
    if parent_path.is_empty() {
        "/".to_string()
    } else {
        parent_path.to_string()
    }
}
