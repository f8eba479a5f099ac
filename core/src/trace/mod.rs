//! Call trace store
//!
//! Append-only log of intercepted calls. Records are reference counted by the
//! state nodes and modify logs that point at them, and are dropped as soon as
//! nothing live refers to them.


use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::handle::{ActionId, Handle, HandleState};

/// Monotonic sequence id of an intercepted call (the api call handle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a recorded call did to the object graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEffect {
    /// Allocated but no trace attached yet
    Pending,
    /// Created one or more handles
    Create,
    /// Moved existing handles to a new state (e.g. memory binding)
    StateChange(HandleState),
    /// Mutated handles without changing their lifecycle
    Modify,
    /// Side effect with no natural handle, anchored on an action node
    Action(ActionId),
    /// Destroyed handles; never retained
    Destroy,
    /// Nothing the tracker cares about
    Untracked,
}

/// One intercepted call
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub id: CallId,
    pub name: String,
    /// Raw serialized call, replayed verbatim
    pub payload: Vec<u8>,
    /// Handles this call created, in creation order
    pub created: SmallVec<[Handle; 2]>,
    pub effect: CallEffect,
    refs: u32,
    pinned: bool,
}

impl CallRecord {
    /// Number of live graph references
    pub fn ref_count(&self) -> u32 {
        self.refs
    }
}

/// Append-only store of call records
#[derive(Debug, Default)]
pub struct CallTraceStore {
    records: BTreeMap<CallId, CallRecord>,
    next_id: u64,
}

impl CallTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, pinned record
    ///
    /// Pinned records survive with zero references until
    /// [`unpin`](Self::unpin) is called.
    pub fn create_call(&mut self) -> CallId {
        self.next_id += 1;
        let id = CallId(self.next_id);
        self.records.insert(
            id,
            CallRecord {
                id,
                name: String::new(),
                payload: Vec::new(),
                created: SmallVec::new(),
                effect: CallEffect::Pending,
                refs: 0,
                pinned: true,
            },
        );
        id
    }

    /// Attach the serialized call to a record
    pub fn set_trace(&mut self, id: CallId, name: &str, payload: &[u8]) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.name.clear();
        record.name.push_str(name);
        record.payload.clear();
        record.payload.extend_from_slice(payload);
        true
    }

    /// Record the effect classification of a call
    pub fn set_effect(&mut self, id: CallId, effect: CallEffect) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                // A call can touch several parameters; keep the most specific effect.
                if matches!(record.effect, CallEffect::Pending | CallEffect::Untracked)
                    || matches!(effect, CallEffect::Create | CallEffect::Action(_))
                {
                    record.effect = effect;
                }
                true
            }
            None => false,
        }
    }

    /// Remember which handles a call created
    pub fn set_created_handles(&mut self, id: CallId, handles: &[Handle]) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.created.extend_from_slice(handles);
                true
            }
            None => false,
        }
    }

    /// Add a live reference to a record
    pub fn retain(&mut self, id: CallId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a live reference; the record goes away when it was the last one
    pub fn release(&mut self, id: CallId) {
        let Some(record) = self.records.get_mut(&id) else {
            tracing::warn!(call = %id, "released unknown api call");
            return;
        };
        record.refs = record.refs.saturating_sub(1);
        if record.refs == 0 && !record.pinned {
            tracing::trace!(call = %id, name = %record.name, "pruned api call");
            self.records.remove(&id);
        }
    }

    /// Unpin a record and drop it if nothing references it
    ///
    /// Returns true when the record was dropped.
    pub fn unpin(&mut self, id: CallId) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.pinned = false;
        if record.refs == 0 {
            self.records.remove(&id);
            return true;
        }
        false
    }

    pub fn get(&self, id: CallId) -> Option<&CallRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.records.contains_key(&id)
    }

    /// Records in sequence order
    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record; sequence ids keep counting up
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
