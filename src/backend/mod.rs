// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics

pub mod buffer;
pub mod compute;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod transfer;

pub use compute::ComputeGrid;
pub use device::VulkanDevice;
pub use swapchain::Swapchain;
