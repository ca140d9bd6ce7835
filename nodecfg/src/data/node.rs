use std::{fmt, sync::Arc};

use crate::{
    data::{fork::ForkId, tags::Tag, value::ValueKind},
    xml::Element,
};

/// Stable identifier of a node inside a [`crate::data::arena::NodeArena`].
///
/// Ids are never reused, so an id of a discarded node keeps failing lookups
/// instead of silently addressing a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Three-state indicator shown next to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayHint {
    /// Valid and still holding its schema default.
    #[default]
    Default,
    /// Valid, edited or loaded from a saved configuration.
    Valid,
    /// Failing its check.
    Invalid,
}

impl DisplayHint {
    /// Derive the hint from validity and default seeding.
    pub fn derive(is_valid: bool, from_default: bool) -> Self {
        match (is_valid, from_default) {
            (false, _) => DisplayHint::Invalid,
            (true, true) => DisplayHint::Default,
            (true, false) => DisplayHint::Valid,
        }
    }
}

/// Kind of a structural node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    /// Plain group.
    Branch,
    /// Selects one of its choice-element children by name.
    Choice,
    /// One alternative of a choice.
    ChoiceElement,
    /// Holds repeated items.
    MultiValued {
        /// Lower bound on item count.
        min_items: usize,
    },
    /// One item of a multi-valued node.
    MultiItem,
}

/// Variant-specific part of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Typed leaf holding text content.
    Value(ValueKind),
    /// Structural node owning ordered children.
    Nested {
        /// Structural flavour.
        kind: NestedKind,
        /// Owned children in declaration order.
        children: Vec<NodeId>,
    },
    /// Stand-in for a shared node at an additional tree position.
    Forked(ForkId),
}

/// One live configuration node.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    pub(crate) definition: Arc<Element>,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) content: String,
    pub(crate) default_value: String,
    pub(crate) comment: Option<String>,
    pub(crate) is_valid: bool,
    pub(crate) hint: DisplayHint,
    pub(crate) from_default: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

impl ConfigNode {
    pub(crate) fn new(
        definition: Arc<Element>,
        name: String,
        parent: Option<NodeId>,
        parent_path: &str,
        kind: NodeKind,
    ) -> Self {
        let path = format!("{parent_path}/{name}");
        let default_value = definition
            .attr(crate::data::tags::ATTR_DEFAULT)
            .unwrap_or_default()
            .to_string();
        let comment = definition
            .attr(crate::data::tags::ATTR_COMMENT)
            .map(str::to_string);
        Self {
            definition,
            name,
            path,
            content: String::new(),
            default_value,
            comment,
            is_valid: false,
            hint: DisplayHint::Default,
            from_default: false,
            parent,
            kind,
        }
    }

    /// Name, unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-separated location, fixed at construction.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the parent position.
    pub fn parent_path(&self) -> &str {
        self.path
            .strip_suffix(self.name.as_str())
            .and_then(|p| p.strip_suffix('/'))
            .unwrap_or_default()
    }

    /// Own content. For forked references this is empty; read through
    /// [`crate::ConfigContext::content`] to follow the fork.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Schema default.
    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    /// Schema comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Result of the last validation.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Display hint derived from validity.
    pub fn display_hint(&self) -> DisplayHint {
        self.hint
    }

    /// Owning parent, `None` for roots and detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Variant data.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Schema element this node was built from.
    pub fn definition(&self) -> &Arc<Element> {
        &self.definition
    }

    /// Schema tag of this node, `None` for multi-valued items and forked
    /// references which have no tag of their own.
    pub fn tag(&self) -> Option<Tag> {
        match &self.kind {
            NodeKind::Value(v) => Some(v.tag()),
            NodeKind::Nested { kind, .. } => match kind {
                NestedKind::Branch => Some(Tag::Branch),
                NestedKind::Choice => Some(Tag::Choice),
                NestedKind::ChoiceElement => Some(Tag::ChoiceElement),
                NestedKind::MultiValued { .. } => Some(Tag::MultiValued),
                NestedKind::MultiItem => None,
            },
            NodeKind::Forked(_) => None,
        }
    }

    /// Children of a structural node, empty otherwise.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Nested { children, .. } => children,
            _ => &[],
        }
    }

    /// Whether this is a structural node.
    pub fn is_nested(&self) -> bool {
        matches!(self.kind, NodeKind::Nested { .. })
    }

    /// Fork this node stands in for, if it is a forked reference.
    pub fn fork(&self) -> Option<ForkId> {
        match self.kind {
            NodeKind::Forked(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Nested { children, .. } => Some(children),
            _ => None,
        }
    }
}
