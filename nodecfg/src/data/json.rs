use serde_json::{Map, Value};

use crate::{
    data::{
        context::ConfigContext,
        fork::ForkStore,
        node::{NestedKind, NodeId, NodeKind},
    },
    error::Result,
};

impl<F: ForkStore> ConfigContext<F> {
    /// Render the current state of the subtree at `id` as JSON.
    ///
    /// Numbers that parse become JSON numbers, everything else stays a
    /// string. Structural nodes become objects keyed by child name, a choice
    /// becomes an object holding only its selected element, and a
    /// multi-valued node becomes an array of its items. Dangling forked
    /// references render as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NodeNotFound`] for stale ids.
    pub fn to_json(&self, id: NodeId) -> Result<Value> {
        let node = self.arena.node(id)?;
        Ok(match &node.kind {
            NodeKind::Value(kind) => kind.as_json(&node.content),
            NodeKind::Forked(_) => match self.resolve(id) {
                Ok(shared) => self.to_json(shared)?,
                Err(_) => Value::Null,
            },
            NodeKind::Nested {
                kind: NestedKind::MultiValued { .. },
                children,
            } => Value::Array(
                children
                    .iter()
                    .map(|item| self.to_json(*item))
                    .collect::<Result<_>>()?,
            ),
            NodeKind::Nested { kind, children } => {
                let mut map = Map::new();
                for child in children {
                    let child_node = self.arena.node(*child)?;
                    if *kind == NestedKind::Choice && child_node.name != node.content {
                        continue;
                    }
                    map.insert(child_node.name.clone(), self.to_json(*child)?);
                }
                Value::Object(map)
            }
        })
    }
}
