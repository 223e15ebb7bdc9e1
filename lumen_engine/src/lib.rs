/*!
# Lumen Engine

Frame pacing and GPU resource lifecycle core of the Lumen renderer.

This crate is backend-agnostic: it drives a `GraphicsDevice` and a
`Swapchain` through narrow traits, and a backend crate (Vulkan) provides
the implementations.

## Architecture

- **Engine**: single-instance owner of the device, frame loop and shutdown
- **FramePacer**: ring of frame slots; fence wait, release flush, record, submit, present
- **DeferredReleaseQueue**: LIFO release of GPU objects once the GPU is done with them
- **ResourcePool**: fixed-capacity descriptor set allocator with generation tracking
- **image_transitions**: layout barriers and scaled blits
- **passes**: gradient (compute) and flash (clear) background passes
*/

// Internal modules
mod error;
mod engine;
mod config;
mod window;
pub mod log;
pub mod graphics_device;
pub mod release_queue;
pub mod descriptor;
pub mod image_transitions;
pub mod frame;
pub mod passes;
pub mod shader;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine and its configuration
    pub use crate::engine::Engine;
    pub use crate::config::{BackgroundConfig, EngineConfig, PoolConfig};

    // Window event source
    pub use crate::window::{WindowEvents, WindowState};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with the device traits and frame machinery
    pub mod render {
        pub use crate::graphics_device::*;
        pub use crate::frame::{DrawPass, FrameContext, FramePacer, FrameSlot};
        pub use crate::release_queue::{DeferredReleaseQueue, ReleaseAction};
        pub use crate::descriptor::{
            DescriptorSet, DescriptorSetLayout, LayoutBuilder, PoolSizeRatio, ResourcePool,
        };
        pub use crate::image_transitions::{blit_region, copy_scaled, image_barrier, transition};
        pub use crate::passes::{FlashPass, GradientPass};
        pub use crate::shader::{load_spirv, spirv_from_bytes};
    }
}

// Re-export math library at crate root
pub use glam;
