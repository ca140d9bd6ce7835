//! Configuration context.
//!
//! [`ConfigContext`] is the host-side owner of everything a set of trees
//! shares: the node arena, the fork registry, the build options and the
//! change subscribers. Independent contexts never see each other's forks.

use std::{collections::HashSet, path::Path, sync::Arc};

use crate::{
    data::{
        arena::NodeArena,
        events::{ChangeCallback, ChangeEvent, ChangeField},
        factory::NodeFactory,
        fork::{ForkId, ForkRegistry, ForkStore},
        node::{ConfigNode, DisplayHint, NestedKind, NodeId, NodeKind},
        value::{CheckEnv, ValueKind},
    },
    error::{Error, Result},
    options::BuildOptions,
    xml::{self, Element},
};

/// Result of promoting a node to a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkOutcome {
    /// The node was detached and a forked reference took its slot.
    Forked {
        /// Fork the node now anchors.
        fork: ForkId,
        /// Reference node inserted in place of the forked node.
        reference: NodeId,
    },
    /// The node has no parent; nothing changed.
    NoParent,
    /// The node already is a forked reference; nothing changed.
    AlreadyForked,
    /// The fork registry refused; nothing changed.
    Declined,
}

/// Owner of config trees and their shared state.
pub struct ConfigContext<F: ForkStore = ForkRegistry> {
    pub(crate) arena: NodeArena,
    pub(crate) forks: F,
    pub(crate) options: BuildOptions,
    listeners: Vec<ChangeCallback>,
    skipped: Vec<String>,
}

impl ConfigContext<ForkRegistry> {
    /// Create a context with the default in-memory fork registry.
    pub fn new(options: BuildOptions) -> Self {
        Self::with_fork_store(options, ForkRegistry::new())
    }
}

impl Default for ConfigContext<ForkRegistry> {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}

impl<F: ForkStore> ConfigContext<F> {
    /// Create a context around a host-provided fork store.
    pub fn with_fork_store(options: BuildOptions, forks: F) -> Self {
        Self {
            arena: NodeArena::new(),
            forks,
            options,
            listeners: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Build options in use.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The fork store.
    pub fn forks(&self) -> &F {
        &self.forks
    }

    /// The node arena.
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Positions of schema elements skipped for unknown tags.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Register a change subscriber.
    pub fn subscribe(&mut self, callback: ChangeCallback) {
        self.listeners.push(callback);
    }

    fn notify(&self, node: NodeId, field: ChangeField) {
        let event = ChangeEvent { node, field };
        for listener in &self.listeners {
            listener(&event);
        }
    }

    fn factory(&mut self) -> NodeFactory<'_> {
        NodeFactory::new(
            &mut self.arena,
            &mut self.forks,
            &self.options,
            &mut self.skipped,
        )
    }

    /// Build and validate a tree from a schema and an optional saved
    /// configuration.
    ///
    /// # Arguments
    ///
    /// * `schema` - Root element of the schema.
    /// * `prior` - Root element of a saved configuration, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is malformed. Values failing their
    /// checks are not errors.
    pub fn build(&mut self, schema: &Arc<Element>, prior: Option<&Element>) -> Result<NodeId> {
        let root = self
            .factory()
            .build_root(schema, prior)?
            .ok_or_else(|| Error::UnknownTag {
                tag: schema.tag.clone(),
                name: schema.attr("name").unwrap_or_default().to_string(),
                parent: "/".to_string(),
            })?;
        let valid = self.validate(root)?;
        debug!(
            "built {} ({} nodes live), valid: {valid}",
            self.arena.node(root)?.path,
            self.arena.len()
        );
        Ok(root)
    }

    /// Build a tree from a schema file and an optional saved configuration
    /// file. A configuration path that does not exist is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or the schema is
    /// malformed.
    pub fn load(
        &mut self,
        schema: impl AsRef<Path>,
        config: Option<impl AsRef<Path>>,
    ) -> Result<NodeId> {
        let schema = Arc::new(xml::parse_file(schema)?);
        let prior = match config {
            Some(path) if path.as_ref().exists() => Some(xml::parse_file(path)?),
            _ => None,
        };
        self.build(&schema, prior.as_ref())
    }

    /// Node by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn node(&self, id: NodeId) -> Result<&ConfigNode> {
        self.arena.node(id)
    }

    /// Follow a forked reference to its shared node; other nodes resolve to
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingFork`] if the shared node was discarded.
    pub fn resolve(&self, id: NodeId) -> Result<NodeId> {
        let node = self.arena.node(id)?;
        match node.kind {
            NodeKind::Forked(fork) => self
                .shared(fork)
                .ok_or_else(|| Error::DanglingFork {
                    path: node.path.clone(),
                }),
            _ => Ok(id),
        }
    }

    fn shared(&self, fork: ForkId) -> Option<NodeId> {
        self.forks.origin(fork).filter(|o| self.arena.contains(*o))
    }

    /// Current content, read through forks. Dangling references read empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn content(&self, id: NodeId) -> Result<&str> {
        let node = self.arena.node(id)?;
        Ok(match node.kind {
            NodeKind::Forked(fork) => self
                .shared(fork)
                .and_then(|o| self.arena.get(o))
                .map(|n| n.content.as_str())
                .unwrap_or_default(),
            _ => node.content.as_str(),
        })
    }

    /// Validity as of the last check, read through forks. Dangling
    /// references are invalid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn is_valid(&self, id: NodeId) -> Result<bool> {
        let node = self.arena.node(id)?;
        Ok(match node.kind {
            NodeKind::Forked(fork) => self
                .shared(fork)
                .and_then(|o| self.arena.get(o))
                .is_some_and(|n| n.is_valid),
            _ => node.is_valid,
        })
    }

    /// Display hint of the node at its own position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn display_hint(&self, id: NodeId) -> Result<DisplayHint> {
        Ok(self.arena.node(id)?.hint)
    }

    /// Topmost ancestor of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;
        while let Some(parent) = self.arena.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Find the node at `path` below `root`, descending through forked
    /// references. Multi-valued items resolve to the first item.
    pub fn find(&self, root: NodeId, path: &str) -> Option<NodeId> {
        let root_node = self.arena.get(root)?;
        if path == root_node.path {
            return Some(root);
        }
        let rest = path
            .strip_prefix(root_node.path.as_str())?
            .strip_prefix('/')?;

        let mut current = root;
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            let node = self.resolve(current).ok().and_then(|id| self.arena.get(id))?;
            current = *node
                .children()
                .iter()
                .find(|c| self.arena.get(**c).is_some_and(|n| n.name == segment))?;
        }
        Some(current)
    }

    /// Nodes of the tree below `id` in pre-order with their depth. Forked
    /// references are listed but not descended into.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn walk(&self, id: NodeId) -> Result<Vec<(NodeId, usize)>> {
        let mut out = Vec::new();
        let mut pending = vec![(id, 0)];
        while let Some((next, depth)) = pending.pop() {
            let node = self.arena.node(next)?;
            out.push((next, depth));
            for child in node.children().iter().rev() {
                pending.push((*child, depth + 1));
            }
        }
        Ok(out)
    }

    /// Assign new content and recompute validity, up to the root and across
    /// every position sharing the node.
    ///
    /// Assignment never rejects a value: a value failing its check is stored
    /// and the node turns invalid. On a choice the content selects the
    /// element of that name. Through a forked reference the shared node is
    /// updated.
    ///
    /// # Errors
    ///
    /// Returns an error for stale ids, dangling forks, and structural nodes
    /// other than choices.
    pub fn set_content(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        let target = self.resolve(id)?;
        let node = self.arena.node_mut(target)?;
        let kind = match &node.kind {
            NodeKind::Value(kind) => Some(kind.clone()),
            NodeKind::Nested {
                kind: NestedKind::Choice,
                ..
            } => None,
            _ => {
                return Err(Error::NotAValue {
                    path: node.path.clone(),
                });
            }
        };
        node.content = value.into();
        node.from_default = false;
        self.notify(target, ChangeField::Content);
        if let Some(fork) = self.forks.fork_of(target) {
            for reference in self.forks.references(fork) {
                self.notify(reference, ChangeField::Content);
            }
        }

        let valid = match kind {
            Some(kind) => self.value_check(target, &kind)?,
            None => self.aggregate(target)?,
        };
        self.apply_validity(target, valid)?;
        self.refresh_upward(target)
    }

    /// Recompute validity of `id` and everything below it.
    ///
    /// Structural nodes check every child, never stopping at the first
    /// failure, so each child's display hint is refreshed. Forked references
    /// report the shared node's validity without rechecking it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn validate(&mut self, id: NodeId) -> Result<bool> {
        let valid = match self.arena.node(id)?.kind.clone() {
            NodeKind::Value(kind) => self.value_check(id, &kind)?,
            NodeKind::Nested { children, .. } => {
                let mut all = true;
                for child in children {
                    all &= self.validate(child)?;
                }
                all && self.local_check(id)?
            }
            NodeKind::Forked(_) => self.is_valid(id)?,
        };
        self.apply_validity(id, valid)?;
        Ok(valid)
    }

    fn value_check(&self, id: NodeId, kind: &ValueKind) -> Result<bool> {
        let roots = self.visible_roots(id)?;
        let resolves = |path: &str| roots.iter().any(|r| self.find(*r, path).is_some());
        let env = CheckEnv {
            options: &self.options,
            resolves: &resolves,
        };
        Ok(kind.check(&self.arena.node(id)?.content, &env))
    }

    /// Roots of every tree `id` appears in. A node below a detached shared
    /// node is visible through each position referencing it.
    fn visible_roots(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut roots = Vec::new();
        let mut pending = vec![id];
        let mut seen = HashSet::new();
        while let Some(next) = pending.pop() {
            let root = self.root_of(next)?;
            if !seen.insert(root) {
                continue;
            }
            roots.push(root);
            if let Some(fork) = self.forks.fork_of(root) {
                pending.extend(
                    self.forks
                        .references(fork)
                        .into_iter()
                        .filter(|r| self.arena.contains(*r)),
                );
            }
        }
        Ok(roots)
    }

    /// Nodes below `root` failing their own check: values with invalid
    /// content, positions whose shared node is invalid or gone, choices
    /// without a valid selection and multi-valued nodes short of items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn invalid_nodes(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for (id, _) in self.walk(root)? {
            let failing = if self.arena.node(id)?.is_nested() {
                !self.local_check(id)?
            } else {
                !self.is_valid(id)?
            };
            if failing {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn local_check(&self, id: NodeId) -> Result<bool> {
        let node = self.arena.node(id)?;
        Ok(match &node.kind {
            NodeKind::Nested {
                kind: NestedKind::Choice,
                children,
            } => children
                .iter()
                .any(|c| self.arena.get(*c).is_some_and(|n| n.name == node.content)),
            NodeKind::Nested {
                kind: NestedKind::MultiValued { min_items },
                children,
            } => children.len() >= *min_items,
            _ => true,
        })
    }

    /// Validity of a structural node from its children's current flags.
    fn aggregate(&self, id: NodeId) -> Result<bool> {
        let node = self.arena.node(id)?;
        if !node.is_nested() {
            return self.is_valid(id);
        }
        let mut all = self.local_check(id)?;
        for child in node.children() {
            all &= self.is_valid(*child)?;
        }
        Ok(all)
    }

    fn apply_validity(&mut self, id: NodeId, valid: bool) -> Result<()> {
        let from_default = match self.arena.node(id)?.kind {
            NodeKind::Forked(fork) => self
                .shared(fork)
                .and_then(|o| self.arena.get(o))
                .is_some_and(|n| n.from_default),
            _ => self.arena.node(id)?.from_default,
        };
        let hint = DisplayHint::derive(valid, from_default);

        let node = self.arena.node_mut(id)?;
        let validity_changed = node.is_valid != valid;
        let hint_changed = node.hint != hint;
        node.is_valid = valid;
        node.hint = hint;

        if validity_changed {
            self.notify(id, ChangeField::Validity);
        }
        if hint_changed {
            self.notify(id, ChangeField::DisplayHint);
        }
        Ok(())
    }

    /// Re-aggregate every ancestor of `start`. At a detached shared node the
    /// walk continues at each position referencing it.
    fn refresh_upward(&mut self, start: NodeId) -> Result<()> {
        let mut pending = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            match self.arena.node(id)?.parent {
                Some(parent) => {
                    let valid = self.aggregate(parent)?;
                    self.apply_validity(parent, valid)?;
                    pending.push(parent);
                }
                None => {
                    let Some(fork) = self.forks.fork_of(id) else {
                        continue;
                    };
                    let valid = self.arena.node(id)?.is_valid;
                    for reference in self.forks.references(fork) {
                        if self.arena.contains(reference) {
                            self.apply_validity(reference, valid)?;
                            pending.push(reference);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Promote `id` to a fork through its parent.
    ///
    /// Roots cannot be forked; that is reported as [`ForkOutcome::NoParent`].
    ///
    /// # Errors
    ///
    /// See [`ConfigContext::fork_child`].
    pub fn fork_node(&mut self, id: NodeId) -> Result<ForkOutcome> {
        let node = self.arena.node(id)?;
        let (parent, path) = (node.parent, node.path.clone());
        match parent {
            Some(parent) => self.fork_child(parent, id),
            None => {
                warn!("can't fork {path}: it has no parent");
                Ok(ForkOutcome::NoParent)
            }
        }
    }

    /// Replace `child` of `parent` with a forked reference.
    ///
    /// The child is detached but stays alive as the fork's shared node; the
    /// reference takes its index so declaration order is preserved. If the
    /// registry declines, the tree is left as it was.
    ///
    /// # Errors
    ///
    /// Returns an error for stale ids, a value-node parent, or a `child`
    /// that is not among `parent`'s children.
    pub fn fork_child(&mut self, parent: NodeId, child: NodeId) -> Result<ForkOutcome> {
        let parent_node = self.arena.node(parent)?;
        if !parent_node.is_nested() {
            warn!("value node {} asked to fork a child", parent_node.path);
            return Err(Error::NotNested {
                path: parent_node.path.clone(),
            });
        }
        let Some(index) = parent_node.children().iter().position(|c| *c == child) else {
            return Err(Error::NotAChild {
                parent: parent_node.path.clone(),
                child: self
                    .arena
                    .get(child)
                    .map(|n| n.path.clone())
                    .unwrap_or_else(|| child.to_string()),
            });
        };

        let child_node = self.arena.node(child)?;
        if child_node.fork().is_some() {
            warn!("{} is already a forked node", child_node.path);
            return Ok(ForkOutcome::AlreadyForked);
        }
        let definition = child_node.definition.clone();
        let name = child_node.name.clone();
        let path = child_node.path.clone();
        let parent_path = child_node.parent_path().to_string();

        let Some(fork) = self.forks.create_or_get(child, &name, &path) else {
            warn!("fork registry declined to share {path}");
            return Ok(ForkOutcome::Declined);
        };

        let reference = self.arena.insert(ConfigNode::new(
            definition,
            name,
            Some(parent),
            &parent_path,
            NodeKind::Forked(fork),
        ));
        self.forks.attach(fork, reference);
        if let Some(children) = self.arena.node_mut(parent)?.children_mut() {
            children[index] = reference;
        }
        self.arena.node_mut(child)?.parent = None;
        self.notify(parent, ChangeField::Children);

        let valid = self.is_valid(reference)?;
        self.apply_validity(reference, valid)?;
        self.refresh_upward(reference)?;
        info!("forked node {path}");
        Ok(ForkOutcome::Forked { fork, reference })
    }

    /// Copy the subtree at `id` into a new, independent, detached tree.
    ///
    /// The copy is built fresh from the schema without fork interception,
    /// then every node takes over content and display state from its
    /// counterpart. Forked positions become ordinary nodes holding the
    /// shared node's current value; positions whose shared node is gone
    /// become empty, invalid nodes. On error nothing of the copy is kept.
    ///
    /// # Errors
    ///
    /// Returns an error for stale ids.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let node = self.arena.node(id)?;
        let definition = node.definition.clone();
        let name = node.name.clone();
        let parent_path = node.parent_path().to_string();
        let is_item = matches!(
            node.kind,
            NodeKind::Nested {
                kind: NestedKind::MultiItem,
                ..
            }
        );

        let clone = if is_item {
            self.factory()
                .without_forks()
                .build_detached_item(&definition, &name, &parent_path)?
        } else {
            self.factory()
                .without_forks()
                .build_detached(&definition, &parent_path)?
                .ok_or_else(|| Error::UnknownTag {
                    tag: definition.tag.clone(),
                    name: name.clone(),
                    parent: parent_path.clone(),
                })?
        };
        if let Err(e) = self.copy_state(id, clone) {
            self.destroy(clone);
            return Err(e);
        }
        debug!("cloned {parent_path}/{name} into {clone}");
        Ok(clone)
    }

    fn copy_state(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        let src = match self.resolve(src) {
            Ok(src) => src,
            Err(Error::DanglingFork { path }) => {
                warn!("{path} lost its shared node, cloned as empty");
                let d = self.arena.node_mut(dst)?;
                d.content.clear();
                d.from_default = false;
                d.is_valid = false;
                d.hint = DisplayHint::Invalid;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let s = self.arena.node(src)?;
        let content = s.content.clone();
        let (hint, from_default, is_valid) = (s.hint, s.from_default, s.is_valid);
        let src_children = s.children().to_vec();
        let is_multi = matches!(
            s.kind,
            NodeKind::Nested {
                kind: NestedKind::MultiValued { .. },
                ..
            }
        );

        let d = self.arena.node_mut(dst)?;
        d.content = content;
        d.hint = hint;
        d.from_default = from_default;
        d.is_valid = is_valid;

        if is_multi {
            self.resize_items(dst, src_children.len())?;
        }
        let dst_children = self.arena.node(dst)?.children().to_vec();
        for (s, d) in src_children.into_iter().zip(dst_children) {
            self.copy_state(s, d)?;
        }
        Ok(())
    }

    fn resize_items(&mut self, multi: NodeId, count: usize) -> Result<()> {
        let definition = self.arena.node(multi)?.definition.clone();
        loop {
            let len = self.arena.node(multi)?.children().len();
            if len < count {
                let item = self
                    .factory()
                    .without_forks()
                    .build_item(&definition, multi, None)?;
                self.children_mut(multi)?.push(item);
            } else if len > count {
                if let Some(last) = self.children_mut(multi)?.pop() {
                    self.destroy(last);
                }
            } else {
                return Ok(());
            }
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        let node = self.arena.node_mut(id)?;
        let path = node.path.clone();
        node.children_mut().ok_or(Error::NotNested { path })
    }

    /// Append a default item to the multi-valued node `multi`.
    ///
    /// # Errors
    ///
    /// Returns an error for stale ids or nodes that are not multi-valued.
    pub fn add_item(&mut self, multi: NodeId) -> Result<NodeId> {
        let node = self.arena.node(multi)?;
        if !matches!(
            node.kind,
            NodeKind::Nested {
                kind: NestedKind::MultiValued { .. },
                ..
            }
        ) {
            return Err(Error::NotMultiValued {
                path: node.path.clone(),
            });
        }
        let definition = node.definition.clone();

        let item = self.factory().build_item(&definition, multi, None)?;
        self.children_mut(multi)?.push(item);
        self.notify(multi, ChangeField::Children);

        self.validate(item)?;
        let valid = self.aggregate(multi)?;
        self.apply_validity(multi, valid)?;
        self.refresh_upward(multi)?;
        Ok(item)
    }

    /// Remove and discard one item of a multi-valued node.
    ///
    /// # Errors
    ///
    /// Returns an error for stale ids or nodes that are not multi-valued
    /// items.
    pub fn remove_item(&mut self, item: NodeId) -> Result<()> {
        let node = self.arena.node(item)?;
        if !matches!(
            node.kind,
            NodeKind::Nested {
                kind: NestedKind::MultiItem,
                ..
            }
        ) {
            return Err(Error::NotMultiValued {
                path: node.path.clone(),
            });
        }
        self.discard(item)
    }

    /// Destroy the subtree at `id`.
    ///
    /// The node is unlinked from its parent, forks anchored at destroyed
    /// nodes are invalidated and the positions referencing them turn
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] for stale ids.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        let parent = self.arena.node(id)?.parent;
        if let Some(parent) = parent
            && let Ok(children) = self.children_mut(parent)
        {
            children.retain(|c| *c != id);
            self.notify(parent, ChangeField::Children);
        }

        let dead_forks = self.destroy(id);
        for fork in dead_forks {
            for reference in self.forks.references(fork) {
                if self.arena.contains(reference) {
                    self.apply_validity(reference, false)?;
                    self.refresh_upward(reference)?;
                }
            }
        }

        if let Some(parent) = parent
            && self.arena.contains(parent)
        {
            let valid = self.aggregate(parent)?;
            self.apply_validity(parent, valid)?;
            self.refresh_upward(parent)?;
        }
        Ok(())
    }

    /// Drop a subtree from the arena and the fork store, returning the forks
    /// that lost their shared node.
    fn destroy(&mut self, id: NodeId) -> Vec<ForkId> {
        let removed = self.arena.remove_subtree(id);
        let dead: Vec<ForkId> = removed
            .iter()
            .filter_map(|n| self.forks.fork_of(*n))
            .collect();
        for node in &removed {
            self.forks.invalidate(*node);
        }
        debug!("discarded {} nodes, {} forks lost", removed.len(), dead.len());
        dead
    }
}
