//! Reconstruction state
//!
//! [`Reconstruction`] ties the handle registry, dependency graph and call trace
//! store together. It is not synchronized on its own; the
//! [`SnapshotTracker`](crate::SnapshotTracker) wraps it in a single lock so the
//! three structures are always updated as a unit.

mod replay;
mod tests;

pub use replay::ReplayBuffer;

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::config::ViolationPolicy;
use crate::error::TrackerError;
use crate::graph::DependencyGraph;
use crate::handle::{ActionId, Handle, HandleState, NodeKey, NodeRef, ObjectType};
use crate::lifecycle::{ModifyMode, ObjectKind};
use crate::registry::HandleRegistry;
use crate::trace::{CallEffect, CallId, CallTraceStore};

/// Handle registry + dependency graph + call trace store
#[derive(Debug)]
pub struct Reconstruction {
    registry: HandleRegistry,
    graph: DependencyGraph,
    trace: CallTraceStore,
    policy: ViolationPolicy,
    /// Edges whose target may still be created later in the current call
    deferred: Option<Vec<(NodeRef, NodeRef)>>,
    /// Last generation handed to a retired handle
    retired: u64,
}

impl Default for Reconstruction {
    fn default() -> Self {
        Self::new(ViolationPolicy::default())
    }
}

impl Reconstruction {
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            registry: HandleRegistry::new(),
            graph: DependencyGraph::new(),
            trace: CallTraceStore::new(),
            policy,
            deferred: None,
            retired: 0,
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn trace(&self) -> &CallTraceStore {
        &self.trace
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Drop all tracked state
    pub fn clear(&mut self) {
        self.registry.clear();
        self.graph.clear();
        self.trace.clear();
        self.deferred = None;
        self.retired = 0;
    }

    /// Drop an open call batch without resolving it
    pub(crate) fn discard_batch(&mut self) {
        if let Some(deferred) = self.deferred.take() {
            tracing::debug!(edges = deferred.len(), "discarding unresolved call batch");
        }
    }

    fn violation(&self, err: TrackerError) -> TrackerError {
        self.policy.raise(err)
    }

    // =========================================================================
    // Call records
    // =========================================================================

    /// Allocate the record for an incoming call
    pub fn create_api_call_info(&mut self) -> CallId {
        self.trace.create_call()
    }

    /// Release the allocation hold on a call record; it is dropped if nothing
    /// in the graph references it
    pub fn destroy_api_call_info_if_unused(&mut self, call: CallId) {
        if self.trace.unpin(call) {
            tracing::trace!(%call, "api call not retained");
        }
    }

    /// Attach the serialized call bytes
    pub fn set_api_trace(&mut self, call: CallId, name: &str, payload: &[u8]) -> Result<(), TrackerError> {
        if self.trace.set_trace(call, name, payload) {
            Ok(())
        } else {
            Err(self.violation(TrackerError::UnknownCall(call)))
        }
    }

    pub fn set_api_effect(&mut self, call: CallId, effect: CallEffect) -> Result<(), TrackerError> {
        if self.trace.set_effect(call, effect) {
            Ok(())
        } else {
            Err(self.violation(TrackerError::UnknownCall(call)))
        }
    }

    /// Record the handles created by a call (replayed in this order)
    pub fn set_created_handles_for_api(&mut self, call: CallId, handles: &[Handle]) -> Result<(), TrackerError> {
        if self.trace.set_created_handles(call, handles) {
            Ok(())
        } else {
            Err(self.violation(TrackerError::UnknownCall(call)))
        }
    }

    // =========================================================================
    // Handle registry
    // =========================================================================

    /// Register newly created handles
    ///
    /// A handle that is already live is a caller bug: it is skipped and the
    /// first such error is returned after the rest are registered.
    pub fn add_handles(&mut self, handles: &[Handle], ty: ObjectType) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for &handle in handles {
            if handle.is_null() {
                continue;
            }
            if !self.registry.insert(handle.into(), ObjectKind::Object(ty)) {
                let err = self.violation(TrackerError::DuplicateHandle(handle.into()));
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Register a synthetic action node
    pub fn add_action(&mut self, action: ActionId) -> Result<(), TrackerError> {
        let key = NodeKey::Action(action);
        if self.registry.insert(key, ObjectKind::Action) {
            Ok(())
        } else {
            Err(self.violation(TrackerError::DuplicateHandle(key)))
        }
    }

    /// Remove handles
    ///
    /// With `recursive`, every transitive dependent goes too. Without it, a
    /// handle that still has dependents is retired: it leaves the live handle
    /// space (so the raw value can be created again) but its record stays
    /// until its last dependent is removed.
    pub fn remove_handles(&mut self, handles: &[Handle], recursive: bool) -> Result<(), TrackerError> {
        let mut result = Ok(());
        let mut removed: HashSet<NodeKey> = HashSet::new();
        let mut orphaned: Vec<NodeKey> = Vec::new();

        for &handle in handles {
            if handle.is_null() {
                continue;
            }
            let key = NodeKey::Object(handle);
            if removed.contains(&key) {
                continue;
            }
            if !self.registry.contains(key) {
                let err = self.violation(TrackerError::UnknownHandle(key));
                if result.is_ok() {
                    result = Err(err);
                }
                continue;
            }

            if !recursive && self.graph.has_dependents(key) {
                self.retire(handle);
                continue;
            }

            let mut doomed = vec![key];
            if recursive {
                doomed.extend(self.graph.transitive_dependents(&[key]));
            }
            for key in doomed {
                if removed.insert(key) {
                    self.remove_key(key, &mut orphaned);
                }
            }
        }

        self.finish_delayed_destroys(orphaned);
        result
    }

    /// Move a destroyed handle with dependents to a retired key
    fn retire(&mut self, handle: Handle) {
        let key = NodeKey::Object(handle);
        let Some(mut record) = self.registry.remove(key) else {
            return;
        };
        record.delayed_destroy = true;
        self.retired += 1;
        let retired = NodeKey::Retired(handle, self.retired);
        self.graph.rekey(key, retired);
        self.registry.insert_record(retired, record);
        tracing::debug!(%handle, %retired, "destroy delayed until dependents are gone");
    }

    fn remove_key(&mut self, key: NodeKey, orphaned: &mut Vec<NodeKey>) {
        let Some(record) = self.registry.remove(key) else {
            return;
        };
        orphaned.extend(self.graph.dependency_keys(key));
        self.graph.remove_key(key);
        for call in record.all_calls() {
            self.trace.release(call);
        }
        tracing::trace!(%key, "removed");
    }

    /// Remove delayed-destroy handles whose last dependent just went away
    fn finish_delayed_destroys(&mut self, mut candidates: Vec<NodeKey>) {
        while let Some(key) = candidates.pop() {
            let ready = self
                .registry
                .get(key)
                .is_some_and(|record| record.delayed_destroy)
                && !self.graph.has_dependents(key);
            if ready {
                tracing::debug!(%key, "completing delayed destroy");
                self.remove_key(key, &mut candidates);
            }
        }
    }

    // =========================================================================
    // Dependency graph
    // =========================================================================

    /// Open a call batch: dependency targets may be created before it closes
    pub fn begin_batch(&mut self) {
        self.deferred.get_or_insert_with(Vec::new);
    }

    /// Close the batch and resolve deferred edges
    pub fn end_batch(&mut self) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for (child, parent) in self.deferred.take().unwrap_or_default() {
            if !self.registry.contains(child.key) {
                continue;
            }
            if self.is_dependency_target(parent.key) {
                self.graph.add_edge(child, parent);
            } else {
                let err = self.violation(TrackerError::MissingDependency {
                    dependent: child,
                    target: parent,
                });
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Live and not waiting on a delayed destroy
    fn is_dependency_target(&self, key: NodeKey) -> bool {
        matches!(key, NodeKey::Object(_) | NodeKey::Action(_)) && self.registry.contains(key)
    }

    /// Record that every dependent (in `dependent_state`) depends on
    /// `depends_on` (in `depends_on_state`)
    ///
    /// Dependents advance to `dependent_state` together with the edge. Adding
    /// an existing edge again changes nothing. A null `depends_on` is ignored.
    pub fn add_handle_dependency(
        &mut self,
        dependents: &[Handle],
        depends_on: Handle,
        dependent_state: HandleState,
        depends_on_state: HandleState,
    ) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for &dependent in dependents {
            if dependent.is_null() {
                continue;
            }
            if let Err(err) = self.add_dependency(dependent.into(), depends_on, dependent_state, depends_on_state) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Node-level dependency insert shared by handles and action nodes
    pub(crate) fn add_dependency(
        &mut self,
        dependent: NodeKey,
        depends_on: Handle,
        dependent_state: HandleState,
        depends_on_state: HandleState,
    ) -> Result<(), TrackerError> {
        if depends_on.is_null() {
            tracing::trace!(%dependent, "skipping dependency on null handle");
            return Ok(());
        }
        let Some(record) = self.registry.get_mut(dependent) else {
            return Err(self.violation(TrackerError::UnknownHandle(dependent)));
        };
        record.advance(dependent_state);

        let child = NodeRef::new(dependent, dependent_state);
        let parent = NodeRef::object(depends_on, depends_on_state);
        if self.is_dependency_target(parent.key) {
            self.graph.add_edge(child, parent);
            return Ok(());
        }
        if let Some(deferred) = self.deferred.as_mut() {
            deferred.push((child, parent));
            return Ok(());
        }
        Err(self.violation(TrackerError::MissingDependency {
            dependent: child,
            target: parent,
        }))
    }

    // =========================================================================
    // Call association
    // =========================================================================

    /// Attach a call to handles and advance them to `target_state`
    ///
    /// With no target state the call is attached to each handle's current state.
    pub fn for_each_handle_add_api(
        &mut self,
        handles: &[Handle],
        call: CallId,
        target_state: Option<HandleState>,
    ) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for &handle in handles {
            if handle.is_null() {
                continue;
            }
            if let Err(err) = self.add_api(handle.into(), call, target_state) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    pub(crate) fn add_api(
        &mut self,
        key: NodeKey,
        call: CallId,
        target_state: Option<HandleState>,
    ) -> Result<(), TrackerError> {
        if !self.trace.contains(call) {
            return Err(self.violation(TrackerError::UnknownCall(call)));
        }
        let Some(record) = self.registry.get_mut(key) else {
            return Err(self.violation(TrackerError::UnknownHandle(key)));
        };
        let state = target_state.unwrap_or(record.state());
        record.advance(state);
        if record.add_state_call(state, call) {
            self.trace.retain(call);
        }
        Ok(())
    }

    /// Make `call` the latest modification of each handle
    pub fn for_each_handle_add_modify_api(
        &mut self,
        handles: &[Handle],
        call: CallId,
        mode: ModifyMode,
    ) -> Result<(), TrackerError> {
        if !self.trace.contains(call) {
            return Err(self.violation(TrackerError::UnknownCall(call)));
        }
        let mut result = Ok(());
        for &handle in handles {
            if handle.is_null() {
                continue;
            }
            let key = NodeKey::Object(handle);
            let Some(record) = self.registry.get_mut(key) else {
                let err = self.violation(TrackerError::UnknownHandle(key));
                if result.is_ok() {
                    result = Err(err);
                }
                continue;
            };
            let superseded = record.add_modify_call(call, mode);
            self.trace.retain(call);
            self.release_all(superseded);
        }
        result
    }

    /// Forget every modification recorded for the handles
    pub fn for_each_handle_clear_modify_api(&mut self, handles: &[Handle]) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for &handle in handles {
            if handle.is_null() {
                continue;
            }
            let key = NodeKey::Object(handle);
            let Some(record) = self.registry.get_mut(key) else {
                let err = self.violation(TrackerError::UnknownHandle(key));
                if result.is_ok() {
                    result = Err(err);
                }
                continue;
            };
            let cleared = record.clear_modify_calls();
            self.release_all(cleared);
        }
        result
    }

    fn release_all(&mut self, calls: SmallVec<[CallId; 4]>) {
        for call in calls {
            self.trace.release(call);
        }
    }
}
