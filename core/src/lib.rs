//! GfxRecon Core - object dependency tracking for capture reconstruction
//!
//! This crate watches the stream of graphics API calls an application makes,
//! keeps a graph of the live objects they create, and can at any time emit
//! the minimal ordered list of calls that rebuilds the current object state
//! on a fresh device.
//!
//! # Architecture
//!
//! - [`SnapshotTracker`] - Thread-safe entry point fed by the call decoder
//! - [`classify`] - Maps a decoded call to the graph updates it implies
//! - [`Reconstruction`] - Object registry, dependency graph and call store
//! - [`ReplayBuffer`] - Ordered calls and handles that recreate live objects
//! - [`snapshot`] - Binary persistence for replay buffers

pub mod classify;
pub mod config;
pub mod error;
pub mod graph;
pub mod handle;
#[cfg(test)]
mod integration;
pub mod lifecycle;
pub mod reconstruction;
pub mod registry;
pub mod script;
pub mod snapshot;
pub mod trace;
pub mod tracker;

// Re-export handle and node types
pub use handle::{ActionId, Handle, HandleState, NodeKey, NodeRef, ObjectType};

// Re-export error types
pub use error::{ConfigError, ScriptError, SnapshotError, TrackerError};

// Re-export configuration
pub use config::{SnapshotConfig, TrackerConfig, ViolationPolicy};

// Re-export tracker state
pub use lifecycle::ModifyMode;
pub use reconstruction::{Reconstruction, ReplayBuffer};
pub use trace::{CallEffect, CallId, CallRecord};
pub use tracker::{SnapshotTracker, TrackerStats};

// Re-export call description types
pub use classify::{CallDetails, CallParam, InterceptedCall, ParamRole};

// Re-export persistence types
pub use script::{CallScript, PlaybackReport};
pub use snapshot::{ReplayBuffers, SnapshotFlags};
