//! Dependency graph over (handle, state) nodes
//!
//! An edge `child -> parent` means the child is only valid while the parent
//! exists. Both directions are indexed so cascades and topological walks are
//! cheap. Edges are a set: inserting the same pair twice is a no-op.

mod tests;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::handle::{HandleState, NodeKey, NodeRef};

pub type ParentList = SmallVec<[NodeRef; 4]>;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    parents: HashMap<NodeRef, ParentList>,
    children: HashMap<NodeRef, HashSet<NodeRef>>,
    edge_count: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `child -> parent`. Returns false if the edge already existed.
    pub fn add_edge(&mut self, child: NodeRef, parent: NodeRef) -> bool {
        let parents = self.parents.entry(child).or_default();
        if parents.contains(&parent) {
            return false;
        }
        parents.push(parent);
        self.children.entry(parent).or_default().insert(child);
        self.edge_count += 1;
        tracing::trace!(%child, %parent, "dependency edge");
        true
    }

    pub fn has_edge(&self, child: NodeRef, parent: NodeRef) -> bool {
        self.parents
            .get(&child)
            .is_some_and(|parents| parents.contains(&parent))
    }

    /// Nodes this node depends on, in insertion order
    pub fn parents(&self, node: NodeRef) -> &[NodeRef] {
        self.parents.get(&node).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Nodes that depend on this node
    pub fn children(&self, node: NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
        self.children.get(&node).into_iter().flatten().copied()
    }

    /// Keys (other than `key` itself) with a node depending on any state of `key`
    pub fn dependent_keys(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = HandleState::ALL
            .iter()
            .flat_map(|&state| self.children(NodeRef::new(key, state)))
            .map(|child| child.key)
            .filter(|&child| child != key)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Keys (other than `key` itself) that any state of `key` depends on
    pub fn dependency_keys(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = HandleState::ALL
            .iter()
            .flat_map(|&state| self.parents(NodeRef::new(key, state)).iter().copied())
            .map(|parent| parent.key)
            .filter(|&parent| parent != key)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn has_dependents(&self, key: NodeKey) -> bool {
        HandleState::ALL.iter().any(|&state| {
            self.children(NodeRef::new(key, state))
                .any(|child| child.key != key)
        })
    }

    /// Every key that transitively depends on one of `roots` (roots excluded)
    pub fn transitive_dependents(&self, roots: &[NodeKey]) -> Vec<NodeKey> {
        let mut seen: HashSet<NodeKey> = roots.iter().copied().collect();
        let mut stack: Vec<NodeKey> = roots.to_vec();
        let mut found = Vec::new();
        while let Some(key) = stack.pop() {
            for dependent in self.dependent_keys(key) {
                if seen.insert(dependent) {
                    found.push(dependent);
                    stack.push(dependent);
                }
            }
        }
        found
    }

    /// Drop every node of `key` with all incident edges
    pub fn remove_key(&mut self, key: NodeKey) {
        for state in HandleState::ALL {
            self.remove_node(NodeRef::new(key, state));
        }
    }

    /// Move every node of `from`, with its edges, to `to`
    pub fn rekey(&mut self, from: NodeKey, to: NodeKey) {
        let rename = |node: NodeRef| {
            if node.key == from {
                NodeRef::new(to, node.state)
            } else {
                node
            }
        };
        let mut moved: Vec<(NodeRef, NodeRef)> = Vec::new();
        for state in HandleState::ALL {
            let node = NodeRef::new(from, state);
            moved.extend(self.parents(node).iter().map(|&parent| (node, parent)));
            moved.extend(self.children(node).map(|child| (child, node)));
        }
        self.remove_key(from);
        for (child, parent) in moved {
            self.add_edge(rename(child), rename(parent));
        }
    }

    fn remove_node(&mut self, node: NodeRef) {
        if let Some(parents) = self.parents.remove(&node) {
            for parent in parents {
                if let Some(children) = self.children.get_mut(&parent) {
                    children.remove(&node);
                    if children.is_empty() {
                        self.children.remove(&parent);
                    }
                }
                self.edge_count -= 1;
            }
        }
        if let Some(children) = self.children.remove(&node) {
            for child in children {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.retain(|p| *p != node);
                    if parents.is_empty() {
                        self.parents.remove(&child);
                    }
                }
                self.edge_count -= 1;
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// All edges as (child, parent), sorted
    pub fn edges(&self) -> Vec<(NodeRef, NodeRef)> {
        let mut edges: Vec<(NodeRef, NodeRef)> = self
            .parents
            .iter()
            .flat_map(|(&child, parents)| parents.iter().map(move |&parent| (child, parent)))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Kahn's check over every node that has an edge
    pub fn is_acyclic(&self) -> bool {
        let mut pending: HashMap<NodeRef, usize> = HashMap::new();
        for (&child, parents) in &self.parents {
            pending.insert(child, parents.len());
            for &parent in parents {
                pending.entry(parent).or_insert(0);
            }
        }
        let mut ready: Vec<NodeRef> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut visited = 0;
        while let Some(node) = ready.pop() {
            visited += 1;
            for child in self.children(node) {
                if let Some(count) = pending.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(child);
                    }
                }
            }
        }
        visited == pending.len()
    }

    pub fn clear(&mut self) {
        self.parents.clear();
        self.children.clear();
        self.edge_count = 0;
    }
}
