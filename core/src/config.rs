//! Tracker configuration
//!
//! Settings are plain TOML. Every field has a default so an empty file (or no
//! file at all) gives the standard behavior.
//!
//! ```toml
//! violations = "log"
//! batched_descriptor_updates = false
//!
//! [snapshot]
//! compress = true
//! checksum = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TrackerError};

/// What to do when a caller breaks the tracking protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Abort on the first violation (debug and test builds)
    Panic,
    /// Log the violation and hand the error back to the caller
    Log,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ViolationPolicy::Panic
        } else {
            ViolationPolicy::Log
        }
    }
}

impl ViolationPolicy {
    /// Route a contract violation through the policy
    pub fn raise(self, err: TrackerError) -> TrackerError {
        match self {
            ViolationPolicy::Panic => panic!("reconstruction contract violation: {err}"),
            ViolationPolicy::Log => {
                tracing::error!(error = %err, "reconstruction contract violation");
                err
            }
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    /// Contract-violation policy (default: panic in debug builds, log otherwise)
    #[serde(default)]
    pub violations: ViolationPolicy,
    /// Descriptor-set updates are batched by the decoder and replayed from
    /// descriptor state, so their action calls are not tracked (default: false)
    #[serde(default)]
    pub batched_descriptor_updates: bool,
    /// Snapshot encoding settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Snapshot encoding settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// LZ4-compress the handle and call sections (default: true)
    #[serde(default = "default_true")]
    pub compress: bool,
    /// Store an xxh3 checksum of both sections (default: true)
    #[serde(default = "default_true")]
    pub checksum: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            compress: default_true(),
            checksum: default_true(),
        }
    }
}

impl TrackerConfig {
    /// Parse a config from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded tracker config");
        Ok(config)
    }

    /// Config that logs violations instead of panicking, regardless of profile
    pub fn lenient() -> Self {
        Self {
            violations: ViolationPolicy::Log,
            ..Self::default()
        }
    }
}
