//! Engine start-up configuration

use std::path::PathBuf;
use std::time::Duration;
use crate::descriptor::PoolSizeRatio;
use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorKind, Extent2D, ImageFormat};

/// Descriptor pool sizing
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Maximum number of live descriptor sets
    pub max_sets: u32,
    /// Descriptors reserved per set, by kind
    pub ratios: Vec<PoolSizeRatio>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sets: 10,
            ratios: vec![PoolSizeRatio::new(DescriptorKind::StorageImage, 1.0)],
        }
    }
}

/// What fills the draw target before anything else draws
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundConfig {
    /// Compute shader writing the whole draw target
    Gradient {
        /// SPIR-V compute shader; failing to load it aborts engine creation
        shader_path: PathBuf,
    },
    /// Clear color pulsing in blue over time
    Flash,
    /// Leave the draw target to the registered passes
    None,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Bound on the wait for a frame slot's previous GPU work
    pub fence_timeout: Duration,
    /// Bound on the wait for a presentable image
    pub acquire_timeout: Duration,
    /// Draw target size (defaults to the swapchain extent at start-up)
    pub draw_extent: Option<Extent2D>,
    /// Draw target format
    pub draw_format: ImageFormat,
    pub descriptor_pool: PoolConfig,
    pub background: BackgroundConfig,
    /// Sleep between event polls while the window is minimized
    pub minimized_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            fence_timeout: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(1),
            draw_extent: None,
            draw_format: ImageFormat::R16G16B16A16_SFLOAT,
            descriptor_pool: PoolConfig::default(),
            background: BackgroundConfig::Gradient {
                shader_path: PathBuf::from("shaders/gradient.comp.spv"),
            },
            minimized_poll_interval: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    /// Reject values the frame loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.fence_timeout.is_zero() || self.acquire_timeout.is_zero() {
            return Err(Error::InitializationFailed(
                "GPU wait timeouts must be non-zero".to_string(),
            ));
        }
        if let Some(extent) = self.draw_extent {
            if extent.is_empty() {
                return Err(Error::InitializationFailed(format!(
                    "draw extent {}x{} is empty",
                    extent.width, extent.height
                )));
            }
        }
        if self.descriptor_pool.max_sets == 0 {
            return Err(Error::InitializationFailed(
                "descriptor pool max_sets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
