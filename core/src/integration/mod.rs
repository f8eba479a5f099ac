//! Integration tests for the reconstruction tracker
//!
//! Drives the tracker with realistic call sequences and checks the object
//! graph, replay order and persisted snapshots end to end.

#[cfg(test)]
mod snapshot_tests;

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::classify::{BindInfo, CallDetails, CallParam, InterceptedCall};
    use crate::config::TrackerConfig;
    use crate::handle::{Handle, ObjectType};
    use crate::tracker::SnapshotTracker;
    use crate::trace::CallId;

    /// Tracker plus builders for common API calls
    pub struct Session {
        pub tracker: SnapshotTracker,
        next_handle: u64,
    }

    impl Session {
        pub fn new() -> Self {
            Self::with_config(TrackerConfig::lenient())
        }

        pub fn with_config(config: TrackerConfig) -> Self {
            Self {
                tracker: SnapshotTracker::new(config),
                next_handle: 0x1000,
            }
        }

        fn fresh(&mut self) -> Handle {
            self.next_handle += 0x10;
            Handle(self.next_handle)
        }

        /// Record a call that must succeed; payload is the name plus handles
        pub fn call(&self, call: InterceptedCall) -> CallId {
            let mut payload = call.name.as_bytes().to_vec();
            for param in &call.params {
                for handle in &param.handles {
                    payload.extend_from_slice(&handle.raw().to_le_bytes());
                }
            }
            let name = call.name.clone();
            self.tracker
                .record_call(&call.payload(payload))
                .unwrap_or_else(|e| panic!("{name} failed: {e}"))
        }

        pub fn instance(&mut self) -> Handle {
            let instance = self.fresh();
            self.call(InterceptedCall::new("vkCreateInstance").param(CallParam::created(
                "pInstance",
                ObjectType::Instance,
                &[instance],
            )));
            instance
        }

        pub fn physical_device(&mut self, instance: Handle) -> Handle {
            let physical = self.fresh();
            self.call(
                InterceptedCall::new("vkEnumeratePhysicalDevices")
                    .param(CallParam::input("instance", ObjectType::Instance, instance))
                    .param(CallParam::created("pPhysicalDevices", ObjectType::PhysicalDevice, &[physical])),
            );
            physical
        }

        pub fn device(&mut self, physical: Handle) -> Handle {
            let device = self.fresh();
            self.call(
                InterceptedCall::new("vkCreateDevice")
                    .param(CallParam::input("physicalDevice", ObjectType::PhysicalDevice, physical))
                    .param(CallParam::created("pDevice", ObjectType::Device, &[device])),
            );
            device
        }

        /// Instance, physical device and device
        pub fn device_chain(&mut self) -> (Handle, Handle, Handle) {
            let instance = self.instance();
            let physical = self.physical_device(instance);
            let device = self.device(physical);
            (instance, physical, device)
        }

        /// Any device-owned object created by `vkCreate<Type>`
        pub fn create(&mut self, device: Handle, ty: ObjectType) -> (Handle, CallId) {
            let handle = self.fresh();
            let name = format!("vkCreate{}", ty.type_name().trim_start_matches("Vk"));
            let id = self.call(
                InterceptedCall::new(&name)
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::created("pHandle", ty, &[handle])),
            );
            (handle, id)
        }

        pub fn allocate_memory(&mut self, device: Handle) -> (Handle, CallId) {
            let memory = self.fresh();
            let id = self.call(
                InterceptedCall::new("vkAllocateMemory")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::created("pMemory", ObjectType::DeviceMemory, &[memory])),
            );
            (memory, id)
        }

        pub fn map_memory(&self, device: Handle, memory: Handle) -> CallId {
            self.call(
                InterceptedCall::new("vkMapMemoryIntoAddressSpaceGOOGLE")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::input("memory", ObjectType::DeviceMemory, memory)),
            )
        }

        pub fn bind_image_memory(&self, device: Handle, image: Handle, memory: Handle) -> CallId {
            self.call(
                InterceptedCall::new("vkBindImageMemory")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::input("image", ObjectType::Image, image))
                    .param(CallParam::input("memory", ObjectType::DeviceMemory, memory)),
            )
        }

        pub fn bind_image_memory2(&self, device: Handle, binds: &[(Handle, Handle)]) -> CallId {
            let bind_infos = binds
                .iter()
                .map(|&(target, memory)| BindInfo { target, memory })
                .collect();
            self.call(
                InterceptedCall::new("vkBindImageMemory2")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .details(CallDetails {
                        bind_infos,
                        ..CallDetails::default()
                    }),
            )
        }

        pub fn image_view(&mut self, device: Handle, image: Handle) -> (Handle, CallId) {
            let view = self.fresh();
            let id = self.call(
                InterceptedCall::new("vkCreateImageView")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::input("image", ObjectType::Image, image))
                    .param(CallParam::created("pView", ObjectType::ImageView, &[view])),
            );
            (view, id)
        }

        pub fn command_buffers(&mut self, device: Handle, pool: Handle, count: usize) -> (Vec<Handle>, CallId) {
            let buffers: Vec<Handle> = (0..count).map(|_| self.fresh()).collect();
            let id = self.call(
                InterceptedCall::new("vkAllocateCommandBuffers")
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::input("commandPool", ObjectType::CommandPool, pool))
                    .param(CallParam::created("pCommandBuffers", ObjectType::CommandBuffer, &buffers)),
            );
            (buffers, id)
        }

        /// `vkBeginCommandBuffer`, `vkEndCommandBuffer`, `vkCmd*` or `vkResetCommandBuffer`
        pub fn command(&self, name: &str, command_buffer: Handle) -> CallId {
            self.call(InterceptedCall::new(name).param(CallParam::input(
                "commandBuffer",
                ObjectType::CommandBuffer,
                command_buffer,
            )))
        }

        pub fn destroy(&self, name: &str, device: Handle, ty: ObjectType, handles: &[Handle]) -> CallId {
            self.call(
                InterceptedCall::new(name)
                    .param(CallParam::input("device", ObjectType::Device, device))
                    .param(CallParam::destroyed("handle", ty, handles)),
            )
        }

        pub fn is_live(&self, handle: Handle) -> bool {
            self.tracker
                .with_state(|recon| recon.registry().contains(handle.into()))
        }
    }
}
