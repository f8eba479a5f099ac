//! Per-object lifecycle records
//!
//! An [`ObjectRecord`] holds, for each [`HandleState`], the calls that moved
//! the object into that state, plus the modification log. Transitions only
//! happen in response to classified calls.

use smallvec::SmallVec;

use crate::handle::{HandleState, ObjectType};
use crate::trace::CallId;

/// What a registry entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Real API object
    Object(ObjectType),
    /// Synthetic node anchoring an action call
    Action,
}

/// Reported lifecycle of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    BoundMemory,
    /// Has retained modify calls on top of its last state
    Modified,
}

/// How a modify call combines with earlier ones on the same handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifyMode {
    /// Only the most recent modification matters (e.g. memory mapping)
    #[default]
    Replace,
    /// Modifications accumulate until cleared (command recording)
    Append,
}

/// Tracked object
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub kind: ObjectKind,
    /// Calls that produced each state, indexed by `HandleState::index`
    state_calls: [SmallVec<[CallId; 2]>; HandleState::COUNT],
    reached: HandleState,
    modify_calls: SmallVec<[CallId; 4]>,
    /// Destroyed without recursion while dependents were still alive
    pub delayed_destroy: bool,
}

impl ObjectRecord {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            state_calls: Default::default(),
            reached: HandleState::Created,
            modify_calls: SmallVec::new(),
            delayed_destroy: false,
        }
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        match self.kind {
            ObjectKind::Object(ty) => Some(ty),
            ObjectKind::Action => None,
        }
    }

    /// Highest state the object has reached
    pub fn state(&self) -> HandleState {
        self.reached
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if !self.modify_calls.is_empty() {
            return Lifecycle::Modified;
        }
        match self.reached {
            HandleState::Created => Lifecycle::Created,
            HandleState::BoundMemory => Lifecycle::BoundMemory,
        }
    }

    /// Move forward to `state`; states never go backwards
    pub fn advance(&mut self, state: HandleState) {
        if state > self.reached {
            tracing::trace!(from = %self.reached, to = %state, "object state transition");
            self.reached = state;
        }
    }

    /// Attach a call to a state slot. Returns false if it was already there.
    pub fn add_state_call(&mut self, state: HandleState, call: CallId) -> bool {
        let calls = &mut self.state_calls[state.index()];
        if calls.contains(&call) {
            return false;
        }
        calls.push(call);
        true
    }

    pub fn state_calls(&self, state: HandleState) -> &[CallId] {
        &self.state_calls[state.index()]
    }

    /// Record a modification. Returns the calls that were superseded.
    pub fn add_modify_call(&mut self, call: CallId, mode: ModifyMode) -> SmallVec<[CallId; 4]> {
        match mode {
            ModifyMode::Replace => {
                let superseded = std::mem::take(&mut self.modify_calls);
                self.modify_calls.push(call);
                superseded
            }
            ModifyMode::Append => {
                self.modify_calls.push(call);
                SmallVec::new()
            }
        }
    }

    /// Forget every modification. Returns the dropped calls.
    pub fn clear_modify_calls(&mut self) -> SmallVec<[CallId; 4]> {
        std::mem::take(&mut self.modify_calls)
    }

    pub fn modify_calls(&self) -> &[CallId] {
        &self.modify_calls
    }

    /// Every call reference this record holds (state slots, then modifications)
    pub fn all_calls(&self) -> impl Iterator<Item = CallId> + '_ {
        self.state_calls
            .iter()
            .flat_map(|calls| calls.iter().copied())
            .chain(self.modify_calls.iter().copied())
    }
}
