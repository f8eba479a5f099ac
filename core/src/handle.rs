//! Handle and object-type primitives
//!
//! Handles are opaque 64-bit values handed out by the graphics API. The tracker
//! never interprets them beyond equality; the object type travels alongside.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque object handle (boxed, guest-visible value)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u64);

impl Handle {
    /// The null handle (`VK_NULL_HANDLE`)
    pub const NULL: Handle = Handle(0);

    /// Raw 64-bit value
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Handle(raw)
    }
}

/// Closed set of object types the tracker knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Instance,
    PhysicalDevice,
    Device,
    Queue,
    CommandPool,
    CommandBuffer,
    DeviceMemory,
    Buffer,
    BufferView,
    Image,
    ImageView,
    ShaderModule,
    PipelineCache,
    PipelineLayout,
    Pipeline,
    RenderPass,
    Framebuffer,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    DescriptorUpdateTemplate,
    Sampler,
    SamplerYcbcrConversion,
    Fence,
    Semaphore,
    Event,
    QueryPool,
    SurfaceKHR,
    SwapchainKHR,
}

impl ObjectType {
    /// Every object type, in declaration order
    pub const ALL: [ObjectType; 29] = [
        ObjectType::Instance,
        ObjectType::PhysicalDevice,
        ObjectType::Device,
        ObjectType::Queue,
        ObjectType::CommandPool,
        ObjectType::CommandBuffer,
        ObjectType::DeviceMemory,
        ObjectType::Buffer,
        ObjectType::BufferView,
        ObjectType::Image,
        ObjectType::ImageView,
        ObjectType::ShaderModule,
        ObjectType::PipelineCache,
        ObjectType::PipelineLayout,
        ObjectType::Pipeline,
        ObjectType::RenderPass,
        ObjectType::Framebuffer,
        ObjectType::DescriptorSetLayout,
        ObjectType::DescriptorPool,
        ObjectType::DescriptorSet,
        ObjectType::DescriptorUpdateTemplate,
        ObjectType::Sampler,
        ObjectType::SamplerYcbcrConversion,
        ObjectType::Fence,
        ObjectType::Semaphore,
        ObjectType::Event,
        ObjectType::QueryPool,
        ObjectType::SurfaceKHR,
        ObjectType::SwapchainKHR,
    ];

    /// API type name (e.g. `VkImage`)
    pub const fn type_name(self) -> &'static str {
        match self {
            ObjectType::Instance => "VkInstance",
            ObjectType::PhysicalDevice => "VkPhysicalDevice",
            ObjectType::Device => "VkDevice",
            ObjectType::Queue => "VkQueue",
            ObjectType::CommandPool => "VkCommandPool",
            ObjectType::CommandBuffer => "VkCommandBuffer",
            ObjectType::DeviceMemory => "VkDeviceMemory",
            ObjectType::Buffer => "VkBuffer",
            ObjectType::BufferView => "VkBufferView",
            ObjectType::Image => "VkImage",
            ObjectType::ImageView => "VkImageView",
            ObjectType::ShaderModule => "VkShaderModule",
            ObjectType::PipelineCache => "VkPipelineCache",
            ObjectType::PipelineLayout => "VkPipelineLayout",
            ObjectType::Pipeline => "VkPipeline",
            ObjectType::RenderPass => "VkRenderPass",
            ObjectType::Framebuffer => "VkFramebuffer",
            ObjectType::DescriptorSetLayout => "VkDescriptorSetLayout",
            ObjectType::DescriptorPool => "VkDescriptorPool",
            ObjectType::DescriptorSet => "VkDescriptorSet",
            ObjectType::DescriptorUpdateTemplate => "VkDescriptorUpdateTemplate",
            ObjectType::Sampler => "VkSampler",
            ObjectType::SamplerYcbcrConversion => "VkSamplerYcbcrConversion",
            ObjectType::Fence => "VkFence",
            ObjectType::Semaphore => "VkSemaphore",
            ObjectType::Event => "VkEvent",
            ObjectType::QueryPool => "VkQueryPool",
            ObjectType::SurfaceKHR => "VkSurfaceKHR",
            ObjectType::SwapchainKHR => "VkSwapchainKHR",
        }
    }

    /// Parse an API type name back into an object type
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.type_name() == name)
    }

    /// Dispatchable handles are pointers in the API; everything else is a 64-bit id
    pub const fn is_dispatchable(self) -> bool {
        matches!(
            self,
            ObjectType::Instance
                | ObjectType::PhysicalDevice
                | ObjectType::Device
                | ObjectType::Queue
                | ObjectType::CommandBuffer
        )
    }

    /// Implicit owner type: a freshly created handle depends on the first input
    /// parameter of this type in its create call.
    pub const fn parent_type(self) -> Option<ObjectType> {
        match self {
            ObjectType::Instance => None,
            ObjectType::PhysicalDevice => Some(ObjectType::Instance),
            ObjectType::Device => Some(ObjectType::PhysicalDevice),
            ObjectType::Queue => Some(ObjectType::Device),
            ObjectType::CommandBuffer => Some(ObjectType::CommandPool),
            _ => Some(ObjectType::Device),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Per-handle state node
///
/// Dependency edges connect (handle, state) pairs, so a bound image can depend
/// on its memory while the unbound image only depends on its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandleState {
    Created,
    BoundMemory,
}

impl HandleState {
    pub const COUNT: usize = 2;
    pub const ALL: [HandleState; Self::COUNT] = [HandleState::Created, HandleState::BoundMemory];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleState::Created => f.write_str("created"),
            HandleState::BoundMemory => f.write_str("bound-memory"),
        }
    }
}

/// Identifier of a synthetic action node (e.g. one descriptor-set update)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Key of anything that can own state nodes in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Object(Handle),
    Action(ActionId),
    /// Destroyed handle kept alive for its dependents, numbered so the raw
    /// value can be created again while it waits
    Retired(Handle, u64),
}

impl NodeKey {
    /// Live handle behind this key
    pub fn handle(self) -> Option<Handle> {
        match self {
            NodeKey::Object(handle) => Some(handle),
            NodeKey::Action(_) | NodeKey::Retired(..) => None,
        }
    }
}

impl From<Handle> for NodeKey {
    fn from(handle: Handle) -> Self {
        NodeKey::Object(handle)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Object(handle) => handle.fmt(f),
            NodeKey::Action(action) => action.fmt(f),
            NodeKey::Retired(handle, generation) => write!(f, "{handle}~{generation}"),
        }
    }
}

/// A single (key, state) vertex of the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub key: NodeKey,
    pub state: HandleState,
}

impl NodeRef {
    pub const fn new(key: NodeKey, state: HandleState) -> Self {
        Self { key, state }
    }

    pub const fn object(handle: Handle, state: HandleState) -> Self {
        Self::new(NodeKey::Object(handle), state)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.state)
    }
}
