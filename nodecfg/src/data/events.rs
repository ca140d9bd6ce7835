use std::sync::Arc;

use crate::data::node::NodeId;

/// Externally visible node field that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeField {
    /// Text content, or the selection of a choice.
    Content,
    /// Validity flag.
    Validity,
    /// Display hint.
    DisplayHint,
    /// Child list of a structural node.
    Children,
}

/// A change notification for one field of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Node whose field changed.
    pub node: NodeId,
    /// Changed field.
    pub field: ChangeField,
}

/// Callback invoked after a node field changed.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;
