/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` and `Swapchain` traits of
`lumen_engine`, using ash for the bindings and gpu-allocator for image
memory. Requires Vulkan 1.3 (synchronization2, dynamic rendering).

```no_run
use lumen_engine::lumen::{Engine, EngineConfig};
use lumen_engine_renderer_vulkan::lumen::{DeviceConfig, VulkanGraphicsDevice};
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let mut device = VulkanGraphicsDevice::new(window, DeviceConfig::default())?;
let swapchain = device.create_swapchain()?;
let engine = Engine::new(Box::new(device), Box::new(swapchain), EngineConfig::default())?;
# Ok(())
# }
```
*/

mod vulkan_config;
mod vulkan_context;
mod vulkan_format;
mod vulkan_graphics_device;
mod vulkan_swapchain;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub mod lumen {
    pub use crate::vulkan_config::{
        DebugMessageFilter, DebugSeverity, DeviceConfig, PresentMode, ValidationStats,
    };
    pub use crate::vulkan_context::GpuContext;
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;
    pub use crate::vulkan_swapchain::VulkanSwapchain;

    // Validation statistics (only with the `vulkan-validation` feature)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
