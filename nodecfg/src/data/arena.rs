use crate::{
    data::node::{ConfigNode, NodeId},
    error::{Error, Result},
};

/// Owner of every node of every tree in a context.
///
/// Slots of removed nodes stay empty forever so stale ids fail lookups.
/// Storage therefore grows with every node ever built in the context,
/// including discarded trees and clones; drop the context to reclaim it.
#[derive(Debug, Default, Clone)]
pub struct NodeArena {
    slots: Vec<Option<ConfigNode>>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub fn insert(&mut self, node: ConfigNode) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    /// Node by id, if still alive.
    pub fn get(&self, id: NodeId) -> Option<&ConfigNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable node by id, if still alive.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ConfigNode> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Node by id or [`Error::NodeNotFound`].
    pub fn node(&self, id: NodeId) -> Result<&ConfigNode> {
        self.get(id).ok_or(Error::NodeNotFound(id))
    }

    /// Mutable node by id or [`Error::NodeNotFound`].
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut ConfigNode> {
        self.get_mut(id).ok_or(Error::NodeNotFound(id))
    }

    /// Whether `id` addresses a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Remove `id` and all nodes it owns, returning the removed ids.
    ///
    /// Forked references are removed but the shared node they stand in for
    /// is not, since it is not owned by the reference.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.slots.get_mut(next.index()).and_then(Option::take) {
                pending.extend(node.children().iter().copied());
                removed.push(next);
            }
        }
        removed
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no node is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        data::node::{NestedKind, NodeKind},
        data::value::ValueKind,
        xml::Element,
    };

    fn leaf(name: &str, parent: Option<NodeId>) -> ConfigNode {
        ConfigNode::new(
            Arc::new(Element::new("STRING-VALUE")),
            name.to_string(),
            parent,
            "/root",
            NodeKind::Value(ValueKind::String),
        )
    }

    #[test]
    fn test_remove_subtree_keeps_ids_stale() {
        let mut arena = NodeArena::new();
        let root = arena.insert(ConfigNode::new(
            Arc::new(Element::new("BRANCH")),
            "root".into(),
            None,
            "",
            NodeKind::Nested {
                kind: NestedKind::Branch,
                children: Vec::new(),
            },
        ));
        let a = arena.insert(leaf("a", Some(root)));
        let b = arena.insert(leaf("b", Some(root)));
        arena
            .node_mut(root)
            .unwrap()
            .children_mut()
            .unwrap()
            .extend([a, b]);
        let other = arena.insert(leaf("other", None));

        let mut removed = arena.remove_subtree(root);
        removed.sort();
        assert_eq!(removed, vec![root, a, b]);
        assert!(!arena.contains(a));
        assert!(arena.contains(other));
        assert_eq!(arena.len(), 1);
        assert!(matches!(arena.node(b), Err(Error::NodeNotFound(id)) if id == b));

        let fresh = arena.insert(leaf("fresh", None));
        assert_ne!(fresh, root);
    }
}
