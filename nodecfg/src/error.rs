//! Error types and result definitions.
//!
//! Only structural problems surface as errors: malformed schema documents,
//! stale node ids, operations applied to the wrong kind of node. A value that
//! fails its type check is never an error, it just marks the node invalid.

use thiserror::Error;

use crate::data::node::NodeId;

/// Result type alias for node tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, editing or writing a configuration tree.
#[derive(Debug, Error)]
pub enum Error {
    /// A schema element has no `name` attribute.
    #[error("schema element <{tag}> under '{parent}' has no name attribute")]
    MissingName {
        /// Tag of the offending schema element.
        tag: String,
        /// Path of the node the element would have been attached to.
        parent: String,
    },

    /// A schema element's name cannot be used as a path segment.
    #[error("schema element name {name:?} under '{parent}' is not a valid node name")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Path of the node the element would have been attached to.
        parent: String,
    },

    /// A schema element carries a tag outside the known set.
    #[error("unknown schema tag <{tag}> for '{name}' under '{parent}'")]
    UnknownTag {
        /// The unrecognised tag.
        tag: String,
        /// Declared name of the element, if any.
        name: String,
        /// Path of the node the element would have been attached to.
        parent: String,
    },

    /// The id does not address a live node.
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    /// A value operation was applied to a structural node.
    #[error("'{path}' is a structural node and holds no value")]
    NotAValue {
        /// Path of the node.
        path: String,
    },

    /// A structural operation was applied to a value node.
    #[error("'{path}' has no children")]
    NotNested {
        /// Path of the node.
        path: String,
    },

    /// An item operation was applied to a node that is not multi-valued.
    #[error("'{path}' is not a multi-valued node")]
    NotMultiValued {
        /// Path of the node.
        path: String,
    },

    /// The node is not a child of the given parent.
    #[error("'{child}' is not a child of '{parent}'")]
    NotAChild {
        /// Path of the parent node.
        parent: String,
        /// Path of the supposed child.
        child: String,
    },

    /// A forked reference points to a fork whose shared node is gone.
    #[error("forked node '{path}' refers to a discarded shared node")]
    DanglingFork {
        /// Path of the reference node.
        path: String,
    },

    /// The document has no root element.
    #[error("document contains no root element")]
    EmptyDocument,

    /// The document ended before an element was closed.
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),

    /// XML syntax error.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute.
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// Options file could not be parsed.
    #[error("invalid options: {0}")]
    Options(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
