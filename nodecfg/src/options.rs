//! Build options.
//!
//! Options are usually kept in a `.nodecfg.toml` next to the configuration:
//!
//! ```toml
//! unknown-tags = "skip"
//! base-dir = "experiments"
//! indent = "    "
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default options file name.
pub const DEFAULT_OPTIONS_FILE: &str = ".nodecfg.toml";

/// What the factory does with a schema tag it does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTagPolicy {
    /// Fail construction with [`crate::Error::UnknownTag`].
    #[default]
    Reject,
    /// Omit the element, log a warning and record it in the context's
    /// skipped list.
    Skip,
}

/// Options consulted while building, validating and writing trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildOptions {
    /// Policy for unrecognised schema tags.
    pub unknown_tags: UnknownTagPolicy,
    /// Directory relative file and directory values are resolved against.
    pub base_dir: Option<PathBuf>,
    /// Indentation unit for nested emission.
    pub indent: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            unknown_tags: UnknownTagPolicy::default(),
            base_dir: None,
            indent: "  ".to_string(),
        }
    }
}

impl BuildOptions {
    /// Parse options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid options TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Resolve a path value against [`BuildOptions::base_dir`].
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
