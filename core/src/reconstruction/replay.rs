//! Replay buffer computation
//!
//! Two phases:
//!
//! 1. **Creation**: every call attached to a live state node, ordered so that
//!    a call comes after the calls of every node it depends on. Ready calls
//!    are taken lowest sequence id first, so unrelated calls keep their
//!    original order.
//! 2. **Modification**: the retained modify calls of live objects, in
//!    sequence order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use super::Reconstruction;
use crate::handle::{Handle, HandleState, NodeRef};
use crate::snapshot::ReplayBuffers;
use crate::trace::CallId;

type CallList = SmallVec<[CallId; 4]>;

/// Ordered calls that rebuild the live object graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayBuffer {
    /// Calls to replay, in order
    pub calls: Vec<CallId>,
    /// Handles created by those calls, in the order replay creates them
    pub handles: Vec<Handle>,
}

impl ReplayBuffer {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}

impl Reconstruction {
    /// Compute the minimal ordered call list that recreates every live handle
    pub fn compute_replay_buffer(&self) -> ReplayBuffer {
        let node_calls = self.node_calls();

        // Call-level dependency graph derived from the node graph.
        let mut nearest_memo: HashMap<NodeRef, CallList> = HashMap::new();
        let mut preds: HashMap<CallId, HashSet<CallId>> = HashMap::new();
        let mut succs: HashMap<CallId, Vec<CallId>> = HashMap::new();
        let mut creation: BTreeSet<CallId> = BTreeSet::new();

        for (&node, calls) in &node_calls {
            let mut visiting = HashSet::new();
            let before = self.calls_before(node, &node_calls, &mut nearest_memo, &mut visiting);
            for &call in calls.iter() {
                creation.insert(call);
                let call_preds = preds.entry(call).or_default();
                for &pred in &before {
                    if pred != call && call_preds.insert(pred) {
                        succs.entry(pred).or_default().push(call);
                    }
                }
            }
        }

        let mut remaining: HashMap<CallId, usize> = creation
            .iter()
            .map(|call| (*call, preds.get(call).map_or(0, HashSet::len)))
            .collect();
        let mut ready: BinaryHeap<Reverse<CallId>> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(call, _)| Reverse(*call))
            .collect();

        let mut calls = Vec::with_capacity(creation.len());
        while let Some(Reverse(call)) = ready.pop() {
            remaining.remove(&call);
            calls.push(call);
            for &next in succs.get(&call).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(&next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let mut stuck: Vec<CallId> = remaining.into_keys().collect();
            stuck.sort_unstable();
            tracing::warn!(
                count = stuck.len(),
                "dependency cycle in replay graph, emitting remaining calls in sequence order"
            );
            calls.extend(stuck);
        }

        let emitted: HashSet<CallId> = calls.iter().copied().collect();
        let modifications: BTreeSet<CallId> = self
            .registry
            .iter()
            .flat_map(|(_, record)| record.modify_calls().iter().copied())
            .filter(|call| !emitted.contains(call))
            .collect();
        calls.extend(modifications);

        let handles = calls
            .iter()
            .filter_map(|&call| self.trace.get(call))
            .flat_map(|record| record.created.iter().copied())
            .collect();

        ReplayBuffer { calls, handles }
    }

    /// Replay buffer with call payloads resolved, ready to persist
    pub fn replay_buffers(&self) -> ReplayBuffers {
        let replay = self.compute_replay_buffer();
        ReplayBuffers {
            handles: replay.handles.iter().map(|h| h.raw()).collect(),
            calls: replay
                .calls
                .iter()
                .filter_map(|&call| self.trace.get(call))
                .map(|record| record.payload.clone())
                .collect(),
        }
    }

    /// Live state nodes that carry calls
    fn node_calls(&self) -> HashMap<NodeRef, CallList> {
        let mut nodes = HashMap::new();
        for (&key, record) in self.registry.iter() {
            for state in HandleState::ALL {
                let calls = record.state_calls(state);
                if !calls.is_empty() {
                    nodes.insert(NodeRef::new(key, state), CallList::from_slice(calls));
                }
            }
        }
        nodes
    }

    /// Calls that must be replayed before anything attached to `node`
    ///
    /// Looks through call-less nodes to their own predecessors. A later state
    /// of an object implicitly follows its earlier states.
    fn calls_before(
        &self,
        node: NodeRef,
        node_calls: &HashMap<NodeRef, CallList>,
        memo: &mut HashMap<NodeRef, CallList>,
        visiting: &mut HashSet<NodeRef>,
    ) -> CallList {
        if let Some(cached) = memo.get(&node) {
            return cached.clone();
        }
        if !visiting.insert(node) {
            return CallList::new();
        }

        let mut predecessors: SmallVec<[NodeRef; 6]> =
            SmallVec::from_slice(self.graph.parents(node));
        predecessors.extend(
            HandleState::ALL
                .iter()
                .filter(|&&state| state < node.state)
                .map(|&state| NodeRef::new(node.key, state)),
        );

        let mut before = CallList::new();
        for pred in predecessors {
            match node_calls.get(&pred) {
                Some(calls) => before.extend(calls.iter().copied()),
                None => {
                    let inherited = self.calls_before(pred, node_calls, memo, visiting);
                    before.extend(inherited);
                }
            }
        }
        before.sort_unstable();
        before.dedup();

        visiting.remove(&node);
        memo.insert(node, before.clone());
        before
    }
}
