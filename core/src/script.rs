//! Call scripts (.toml)
//!
//! A human-readable list of intercepted calls, used to drive the tracker
//! without a live decoder.
//!
//! # Example Script
//!
//! ```toml
//! [[calls]]
//! name = "vkCreateInstance"
//! params = [{ name = "pInstance", type = "Instance", handles = [1], role = "created" }]
//!
//! [[calls]]
//! name = "vkEnumeratePhysicalDevices"
//! payload = "0a0b0c"
//! params = [
//!   { name = "instance", type = "Instance", handles = [1] },
//!   { name = "pPhysicalDevices", type = "PhysicalDevice", handles = [2], role = "created" },
//! ]
//! ```
//!
//! A call without `payload` replays as its name bytes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::{BindInfo, CallDetails, CallParam, DescriptorWrite, InterceptedCall, PipelineDeps};
use crate::error::{ScriptError, TrackerError};
use crate::tracker::SnapshotTracker;
use crate::trace::CallId;

/// Complete call script file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallScript {
    #[serde(default)]
    pub calls: Vec<ScriptCall>,
}

/// One `[[calls]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptCall {
    pub name: String,
    /// Hex-encoded serialized call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default)]
    pub params: Vec<CallParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptor_writes: Vec<DescriptorWrite>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineDeps>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bind_infos: Vec<BindInfo>,
}

/// Outcome of feeding a script to a tracker
#[derive(Debug, Default)]
pub struct PlaybackReport {
    pub recorded: Vec<CallId>,
    /// (script index, call name, error)
    pub failures: Vec<(usize, String, TrackerError)>,
}

impl PlaybackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl CallScript {
    pub fn from_toml(toml_str: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Decode every entry into an intercepted call
    pub fn to_calls(&self) -> Result<Vec<InterceptedCall>, ScriptError> {
        self.calls
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_call(index))
            .collect()
    }

    /// Record every call in order
    ///
    /// Failed calls are collected rather than aborting the run.
    pub fn play(&self, tracker: &SnapshotTracker) -> Result<PlaybackReport, ScriptError> {
        let calls = self.to_calls()?;
        let mut report = PlaybackReport::default();
        for (index, call) in calls.iter().enumerate() {
            match tracker.record_call(call) {
                Ok(id) => report.recorded.push(id),
                Err(err) => {
                    tracing::warn!(index, name = %call.name, error = %err, "script call failed");
                    report.failures.push((index, call.name.clone(), err));
                }
            }
        }
        Ok(report)
    }
}

impl ScriptCall {
    fn to_call(&self, index: usize) -> Result<InterceptedCall, ScriptError> {
        let payload = match &self.payload {
            Some(encoded) => hex::decode(encoded.trim()).map_err(|source| ScriptError::InvalidPayload {
                index,
                name: self.name.clone(),
                source,
            })?,
            None => self.name.as_bytes().to_vec(),
        };
        Ok(InterceptedCall {
            name: self.name.clone(),
            params: self.params.clone(),
            details: CallDetails {
                descriptor_writes: self.descriptor_writes.clone(),
                pipelines: self.pipelines.clone(),
                bind_infos: self.bind_infos.clone(),
            },
            payload,
        })
    }
}
