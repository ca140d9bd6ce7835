//! Fork registry.
//!
//! A fork is one shared value occupying several tree positions. The node that
//! was forked becomes the shared node: it is detached from its parent and the
//! parent slot, plus any later position built at the same path, holds a
//! forked reference instead. The registry only stores node ids, the nodes
//! themselves stay in the arena.

use std::{collections::HashMap, fmt};

use crate::data::node::NodeId;

/// Identifier of a fork inside a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForkId(pub(crate) u32);

impl fmt::Display for ForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fork#{}", self.0)
    }
}

/// One shared value and the positions referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fork {
    /// Fork id.
    pub id: ForkId,
    /// Name of the forked node.
    pub name: String,
    /// Path of the position the fork was created at.
    pub position: String,
    /// Shared node, `None` once it has been discarded.
    pub origin: Option<NodeId>,
    /// Forked reference nodes bound to this fork.
    pub references: Vec<NodeId>,
}

impl Fork {
    /// Whether the shared node is still alive.
    pub fn is_live(&self) -> bool {
        self.origin.is_some()
    }
}

/// Fork bookkeeping the node tree relies on.
///
/// Positions are node paths, so a fork created in one tree is picked up by
/// any later tree built in the same context from the same schema.
pub trait ForkStore {
    /// Live fork covering `position`.
    fn lookup(&self, position: &str) -> Option<ForkId>;

    /// Fork anchored at `origin`, created if needed.
    ///
    /// Returns `None` when the registry declines, e.g. because another live
    /// node already anchors a fork at `position`.
    fn create_or_get(&mut self, origin: NodeId, name: &str, position: &str) -> Option<ForkId>;

    /// Shared node of `fork`.
    fn origin(&self, fork: ForkId) -> Option<NodeId>;

    /// Fork anchored at `origin`.
    fn fork_of(&self, origin: NodeId) -> Option<ForkId>;

    /// Bind a forked reference node to `fork`.
    fn attach(&mut self, fork: ForkId, reference: NodeId);

    /// Forked reference nodes bound to `fork`.
    fn references(&self, fork: ForkId) -> Vec<NodeId>;

    /// Forget every use of a destroyed node.
    ///
    /// Forks anchored at it become dead: their references stay in place but
    /// read as empty and invalid.
    fn invalidate(&mut self, node: NodeId);
}

/// Default in-memory [`ForkStore`].
#[derive(Debug, Default, Clone)]
pub struct ForkRegistry {
    forks: Vec<Fork>,
    by_position: HashMap<String, ForkId>,
    by_origin: HashMap<NodeId, ForkId>,
}

impl ForkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fork by id.
    pub fn get(&self, id: ForkId) -> Option<&Fork> {
        self.forks.get(id.0 as usize)
    }

    /// All forks, dead ones included, in creation order.
    pub fn forks(&self) -> impl Iterator<Item = &Fork> {
        self.forks.iter()
    }

    fn get_mut(&mut self, id: ForkId) -> Option<&mut Fork> {
        self.forks.get_mut(id.0 as usize)
    }
}

impl ForkStore for ForkRegistry {
    fn lookup(&self, position: &str) -> Option<ForkId> {
        self.by_position
            .get(position)
            .copied()
            .filter(|id| self.get(*id).is_some_and(Fork::is_live))
    }

    fn create_or_get(&mut self, origin: NodeId, name: &str, position: &str) -> Option<ForkId> {
        if let Some(id) = self.by_origin.get(&origin) {
            return Some(*id);
        }
        if let Some(existing) = self.lookup(position) {
            warn!("position {position} is already shared by {existing}");
            return None;
        }

        let id = ForkId(self.forks.len() as u32);
        self.forks.push(Fork {
            id,
            name: name.to_string(),
            position: position.to_string(),
            origin: Some(origin),
            references: Vec::new(),
        });
        self.by_position.insert(position.to_string(), id);
        self.by_origin.insert(origin, id);
        debug!("created {id} for {position} anchored at {origin}");
        Some(id)
    }

    fn origin(&self, fork: ForkId) -> Option<NodeId> {
        self.get(fork).and_then(|f| f.origin)
    }

    fn fork_of(&self, origin: NodeId) -> Option<ForkId> {
        self.by_origin.get(&origin).copied()
    }

    fn attach(&mut self, fork: ForkId, reference: NodeId) {
        if let Some(f) = self.get_mut(fork)
            && !f.references.contains(&reference)
        {
            f.references.push(reference);
        }
    }

    fn references(&self, fork: ForkId) -> Vec<NodeId> {
        self.get(fork)
            .map(|f| f.references.clone())
            .unwrap_or_default()
    }

    fn invalidate(&mut self, node: NodeId) {
        if let Some(id) = self.by_origin.remove(&node) {
            if let Some(f) = self.get_mut(id) {
                f.origin = None;
                debug!("{id} lost its shared node {node}");
            }
            self.by_position.retain(|_, v| *v != id);
        }
        for f in &mut self.forks {
            f.references.retain(|r| *r != node);
        }
    }
}
