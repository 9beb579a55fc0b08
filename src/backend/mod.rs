// Backend module - Vulkan abstraction layer
//
// Design: Thin wrappers around ash that own their handles and free them on drop

pub mod buffer;
pub mod descriptor;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use swapchain::Swapchain;
