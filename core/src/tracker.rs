//! Shared snapshot tracker
//!
//! [`SnapshotTracker`] is the one object decoder threads talk to. All
//! reconstruction state sits behind a single mutex; every public operation
//! holds it for its whole duration and never performs I/O while holding it.

use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::classify::{self, InterceptedCall};
use crate::config::TrackerConfig;
use crate::error::{SnapshotError, TrackerError};
use crate::handle::{Handle, HandleState, NodeKey, ObjectType};
use crate::lifecycle::{Lifecycle, ModifyMode};
use crate::reconstruction::{Reconstruction, ReplayBuffer};
use crate::snapshot::{BinaryReader, BinaryWriter, ReplayBuffers, SnapshotFlags};
use crate::trace::CallId;

/// Counts describing the tracked state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackerStats {
    pub live_handles: usize,
    pub action_nodes: usize,
    pub delayed_destroys: usize,
    /// Objects carrying retained modify calls
    pub modified_objects: usize,
    pub edges: usize,
    pub retained_calls: usize,
}

/// Thread-safe owner of the reconstruction state
#[derive(Debug)]
pub struct SnapshotTracker {
    config: TrackerConfig,
    inner: Mutex<Reconstruction>,
}

impl Default for SnapshotTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl SnapshotTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let inner = Mutex::new(Reconstruction::new(config.violations));
        Self { config, inner }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Reconstruction> {
        self.inner.lock().unwrap_or_else(|e| {
            tracing::warn!("reconstruction mutex poisoned; continuing");
            let mut recon = e.into_inner();
            recon.discard_batch();
            recon
        })
    }

    /// Run `f` against the locked state (inspection only)
    pub fn with_state<T>(&self, f: impl FnOnce(&Reconstruction) -> T) -> T {
        f(&self.lock())
    }

    /// Classify and apply one intercepted call
    ///
    /// Classification happens before the lock is taken; the call's effects
    /// are then applied as a unit.
    pub fn record_call(&self, call: &InterceptedCall) -> Result<CallId, TrackerError> {
        let plan = classify::classify(call, &self.config)?;

        let mut recon = self.lock();
        let id = recon.create_api_call_info();
        let mut scope = CallScope::open(recon, id);
        let mut result = scope.recon.set_api_trace(id, &call.name, &call.payload);

        scope.recon.begin_batch();
        let applied = plan.apply(&mut scope.recon, id);
        let closed = scope.recon.end_batch();
        scope.close();

        for outcome in [applied, closed] {
            if result.is_ok() {
                result = outcome;
            }
        }

        tracing::debug!(
            call = %id,
            name = %call.name,
            steps = plan.steps.len(),
            ok = result.is_ok(),
            "recorded api call"
        );
        result.map(|()| id)
    }

    // =========================================================================
    // Direct bookkeeping (each one takes the lock once)
    // =========================================================================

    pub fn create_api_call_info(&self) -> CallId {
        self.lock().create_api_call_info()
    }

    pub fn destroy_api_call_info_if_unused(&self, call: CallId) {
        self.lock().destroy_api_call_info_if_unused(call);
    }

    pub fn set_api_trace(&self, call: CallId, name: &str, payload: &[u8]) -> Result<(), TrackerError> {
        self.lock().set_api_trace(call, name, payload)
    }

    pub fn set_created_handles_for_api(&self, call: CallId, handles: &[Handle]) -> Result<(), TrackerError> {
        self.lock().set_created_handles_for_api(call, handles)
    }

    pub fn add_handles(&self, handles: &[Handle], ty: ObjectType) -> Result<(), TrackerError> {
        self.lock().add_handles(handles, ty)
    }

    pub fn remove_handles(&self, handles: &[Handle], recursive: bool) -> Result<(), TrackerError> {
        self.lock().remove_handles(handles, recursive)
    }

    pub fn add_handle_dependency(
        &self,
        dependents: &[Handle],
        depends_on: Handle,
        dependent_state: HandleState,
        depends_on_state: HandleState,
    ) -> Result<(), TrackerError> {
        self.lock()
            .add_handle_dependency(dependents, depends_on, dependent_state, depends_on_state)
    }

    pub fn for_each_handle_add_api(
        &self,
        handles: &[Handle],
        call: CallId,
        target_state: Option<HandleState>,
    ) -> Result<(), TrackerError> {
        self.lock().for_each_handle_add_api(handles, call, target_state)
    }

    pub fn for_each_handle_add_modify_api(
        &self,
        handles: &[Handle],
        call: CallId,
        mode: ModifyMode,
    ) -> Result<(), TrackerError> {
        self.lock().for_each_handle_add_modify_api(handles, call, mode)
    }

    pub fn for_each_handle_clear_modify_api(&self, handles: &[Handle]) -> Result<(), TrackerError> {
        self.lock().for_each_handle_clear_modify_api(handles)
    }

    /// Forget everything
    pub fn clear(&self) {
        self.lock().clear();
        tracing::debug!("tracker cleared");
    }

    // =========================================================================
    // Replay
    // =========================================================================

    pub fn compute_replay_buffer(&self) -> ReplayBuffer {
        self.lock().compute_replay_buffer()
    }

    pub fn replay_buffers(&self) -> ReplayBuffers {
        self.lock().replay_buffers()
    }

    /// Persist the current replay buffer
    ///
    /// The buffer is materialized under the lock and written after it is
    /// released.
    pub fn save_replay_buffers<W: Write>(&self, writer: W) -> Result<ReplayBuffers, SnapshotError> {
        let buffers = self.replay_buffers();
        let flags = SnapshotFlags::from_config(&self.config.snapshot);
        BinaryWriter::new(writer).write_buffers(&buffers, flags)?;
        Ok(buffers)
    }

    /// Decode a persisted replay buffer
    pub fn load_replay_buffers<R: Read>(reader: R) -> Result<ReplayBuffers, SnapshotError> {
        BinaryReader::new(reader).read_buffers()
    }

    pub fn stats(&self) -> TrackerStats {
        let recon = self.lock();
        let mut stats = TrackerStats {
            edges: recon.graph().edge_count(),
            retained_calls: recon.trace().len(),
            ..TrackerStats::default()
        };
        for (key, record) in recon.registry().iter() {
            match key {
                NodeKey::Object(_) => stats.live_handles += 1,
                NodeKey::Action(_) => stats.action_nodes += 1,
                NodeKey::Retired(..) => {}
            }
            if record.delayed_destroy {
                stats.delayed_destroys += 1;
            }
            if record.lifecycle() == Lifecycle::Modified {
                stats.modified_objects += 1;
            }
        }
        stats
    }
}

/// A call being applied under the lock
///
/// Dropping it unclosed (a violation unwinding under the panic policy)
/// discards the open batch and releases the call's pin.
struct CallScope<'a> {
    recon: MutexGuard<'a, Reconstruction>,
    call: CallId,
    open: bool,
}

impl<'a> CallScope<'a> {
    fn open(recon: MutexGuard<'a, Reconstruction>, call: CallId) -> Self {
        Self {
            recon,
            call,
            open: true,
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.recon.destroy_api_call_info_if_unused(self.call);
        }
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.recon.discard_batch();
            self.close();
        }
    }
}
