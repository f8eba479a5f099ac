//! Error types for the reconstruction tracker

use crate::handle::{NodeKey, NodeRef};
use crate::trace::CallId;

/// Bookkeeping errors raised while tracking calls
///
/// Everything except [`TrackerError::Unsupported`] is a caller-side protocol
/// bug; these go through the configured [`ViolationPolicy`](crate::ViolationPolicy).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Handle registered while already live
    #[error("{0} is already registered")]
    DuplicateHandle(NodeKey),

    /// Handle (or action node) is not in the registry
    #[error("{0} is not a live handle")]
    UnknownHandle(NodeKey),

    /// Dependency target missing when the edge was added
    #[error("dependency target {target} of {dependent} is not a live handle")]
    MissingDependency { dependent: NodeRef, target: NodeRef },

    /// Call id does not exist in the trace store
    #[error("unknown api call {0}")]
    UnknownCall(CallId),

    /// Call shape the classification table cannot express
    #[error("unsupported call {call}: {reason}")]
    Unsupported { call: String, reason: String },
}

impl TrackerError {
    /// True for contract violations (as opposed to unsupported input)
    pub fn is_violation(&self) -> bool {
        !matches!(self, TrackerError::Unsupported { .. })
    }
}

/// Errors reading or writing persisted replay buffers
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad snapshot magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),

    #[error("snapshot checksum mismatch (expected {expected:#018x}, got {actual:#018x})")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("snapshot section corrupt: {0}")]
    Corrupt(String),

    #[error("LZ4 decompression failed: {0}")]
    Decompress(String),
}

/// Errors loading a [`TrackerConfig`](crate::TrackerConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors loading a call script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid script: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("call {index} ({name}): invalid hex payload: {source}")]
    InvalidPayload {
        index: usize,
        name: String,
        source: hex::FromHexError,
    },
}
