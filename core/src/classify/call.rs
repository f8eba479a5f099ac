//! Intercepted call description
//!
//! This is everything the decoder hands over per call: the name, handle-typed
//! parameters with their created/destroyed annotation, the few structured
//! details the special-case extractors need, and the raw serialized call.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::handle::{Handle, ObjectType};

pub type HandleList = SmallVec<[Handle; 2]>;

/// How a handle parameter takes part in the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamRole {
    #[default]
    Input,
    /// Handles returned by the call
    Created,
    /// Handles destroyed or freed by the call
    Destroyed,
}

/// One handle-typed parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParam {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub handles: HandleList,
    #[serde(default)]
    pub role: ParamRole,
}

impl CallParam {
    pub fn new(name: &str, object_type: ObjectType, handles: &[Handle], role: ParamRole) -> Self {
        Self {
            name: name.to_string(),
            object_type,
            handles: HandleList::from_slice(handles),
            role,
        }
    }

    pub fn input(name: &str, object_type: ObjectType, handle: Handle) -> Self {
        Self::new(name, object_type, &[handle], ParamRole::Input)
    }

    pub fn created(name: &str, object_type: ObjectType, handles: &[Handle]) -> Self {
        Self::new(name, object_type, handles, ParamRole::Created)
    }

    pub fn destroyed(name: &str, object_type: ObjectType, handles: &[Handle]) -> Self {
        Self::new(name, object_type, handles, ParamRole::Destroyed)
    }
}

/// Descriptor kinds the tracker distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorImageInfo {
    #[serde(default)]
    pub sampler: Handle,
    #[serde(default)]
    pub image_view: Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorBufferInfo {
    #[serde(default)]
    pub buffer: Handle,
}

/// One element of `pDescriptorWrites`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorWrite {
    pub dst_set: Handle,
    pub descriptor_type: DescriptorType,
    #[serde(default)]
    pub image_infos: Vec<DescriptorImageInfo>,
    #[serde(default)]
    pub buffer_infos: Vec<DescriptorBufferInfo>,
}

/// Handles referenced by one graphics pipeline create info
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineDeps {
    #[serde(default)]
    pub render_pass: Handle,
    /// Shader module of each stage
    #[serde(default)]
    pub stages: Vec<Handle>,
}

/// One element of `pBindInfos` (image or buffer, depending on the call)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindInfo {
    pub target: Handle,
    pub memory: Handle,
}

/// Structured parameter contents for calls with special-case extractors
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallDetails {
    #[serde(default)]
    pub descriptor_writes: Vec<DescriptorWrite>,
    #[serde(default)]
    pub pipelines: Vec<PipelineDeps>,
    #[serde(default)]
    pub bind_infos: Vec<BindInfo>,
}

/// A call as seen by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterceptedCall {
    pub name: String,
    pub params: Vec<CallParam>,
    pub details: CallDetails,
    /// Serialized call, replayed verbatim
    pub payload: Vec<u8>,
}

impl InterceptedCall {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn param(mut self, param: CallParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn details(mut self, details: CallDetails) -> Self {
        self.details = details;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Parameter by name
    pub fn find_param(&self, name: &str) -> Option<&CallParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// First handle of the named parameter, or null
    pub fn handle_of(&self, name: &str) -> Handle {
        self.find_param(name)
            .and_then(|p| p.handles.first().copied())
            .unwrap_or(Handle::NULL)
    }
}
