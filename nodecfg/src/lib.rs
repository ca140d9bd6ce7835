//! # nodecfg
//!
//! Schema-driven configuration trees.
//!
//! A schema document declares named, typed fields and groups of fields.
//! From it, `nodecfg` builds a live tree of nodes that can be seeded from a
//! previously saved configuration, edited, validated, cloned, shared between
//! several positions ("forked") and written back out.
//!
//! ## Features
//!
//! - Integer, floating-point, string, file, directory, cross-reference and
//!   enumerated values
//! - Branches, choices and multi-valued groups
//! - Per-level merge of saved values over schema defaults
//! - Validation cascading from every node up to the root
//! - Forks: one value, several tree positions, edits visible everywhere
//! - XML and JSON output
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use nodecfg::{ConfigContext, xml};
//!
//! let schema = xml::parse(
//!     r#"<BRANCH name="exp"><INTEGER-VALUE name="retries" default="3"/></BRANCH>"#,
//! ).unwrap();
//!
//! let mut ctx = ConfigContext::default();
//! let root = ctx.build(&Arc::new(schema), None).unwrap();
//! let retries = ctx.find(root, "/exp/retries").unwrap();
//! assert_eq!(ctx.content(retries).unwrap(), "3");
//!
//! ctx.set_content(retries, "many").unwrap();
//! assert!(!ctx.is_valid(root).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Node trees, factory, forks, validation and output
//! - [`xml`] - Element trees and XML parsing
//! - [`options`] - Build options
//! - [`error`] - Error types

#[macro_use]
extern crate log;

/// Configuration node trees.
pub mod data;

/// Error types and result definitions.
pub mod error;

/// Build options.
pub mod options;

/// Element trees and XML parsing.
pub mod xml;

pub use data::{
    ConfigContext, ForkOutcome,
    events::{ChangeCallback, ChangeEvent, ChangeField},
    fork::{Fork, ForkId, ForkRegistry, ForkStore},
    node::{ConfigNode, DisplayHint, NodeId},
};
pub use error::{Error, Result};
pub use options::{BuildOptions, UnknownTagPolicy};
