/// Graphics device module - GPU handles, the device trait and the swapchain trait

// Module declarations
pub mod types;
pub mod graphics_device;
pub mod swapchain;

// Re-export everything
pub use types::*;
pub use graphics_device::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
