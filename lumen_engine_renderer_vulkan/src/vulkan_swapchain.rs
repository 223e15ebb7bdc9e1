/// VulkanSwapchain - Vulkan implementation of the Swapchain trait

use ash::vk;
use ash::vk::Handle;
use lumen_engine::lumen::render::{
    Extent2D, ImageFormat, ImageHandle, SemaphoreHandle, SurfaceStatus, Swapchain,
};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail, engine_err, engine_error, engine_info};
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_config::PresentMode;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{present_mode_to_vk, vk_format_to_format};

const SOURCE: &str = "lumen::vulkan";

/// Vulkan swapchain implementation
///
/// Manages presentation to the window. Images are only written by transfer
/// (the frame's draw target is blitted into them), so they are created with
/// TRANSFER_DST usage. Synchronization objects belong to the caller.
pub struct VulkanSwapchain {
    gpu_context: Arc<GpuContext>,

    /// Surface
    surface: vk::SurfaceKHR,

    /// Swapchain
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

/// Prefer 8-bit BGRA/RGBA UNORM with sRGB non-linear color space, else the first format
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_UNORM || f.format == vk::Format::R8G8B8A8_UNORM)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Requested mode when the surface supports it, FIFO otherwise
pub(crate) fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: PresentMode,
) -> vk::PresentModeKHR {
    let wanted = present_mode_to_vk(preferred);
    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface-dictated extent, or the requested one clamped to the surface limits
pub(crate) fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more image than the minimum, bounded by the maximum (0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

impl VulkanSwapchain {
    /// Create a new swapchain
    ///
    /// # Arguments
    ///
    /// * `gpu_context` - Shared device state
    /// * `surface` - Window surface; the swapchain destroys it on drop
    /// * `extent` - Requested extent, used when the surface does not dictate one
    /// * `present_mode` - Preferred presentation mode
    pub(crate) fn new(
        gpu_context: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        extent: Extent2D,
        present_mode: PresentMode,
    ) -> Result<Self> {
        let surface_loader = &gpu_context.surface_loader;
        let physical_device = gpu_context.physical_device;

        unsafe {
            let creation = (|| -> Result<(vk::SurfaceFormatKHR, vk::PresentModeKHR)> {
                let formats = surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)
                    .map_err(|e| {
                        engine_error!(SOURCE, "Failed to query surface formats: {:?}", e);
                        Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                    })?;
                let surface_format = choose_surface_format(&formats).ok_or_else(|| {
                    engine_error!(SOURCE, "Surface reports no formats");
                    Error::InitializationFailed("Surface reports no formats".to_string())
                })?;

                let modes = surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)
                    .map_err(|e| {
                        engine_error!(SOURCE, "Failed to query present modes: {:?}", e);
                        Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                    })?;

                Ok((surface_format, choose_present_mode(&modes, present_mode)))
            })();

            let (surface_format, present_mode) = match creation {
                Ok(choice) => choice,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    return Err(e);
                }
            };

            let swapchain_loader =
                ash::khr::swapchain::Device::new(&gpu_context.instance, &gpu_context.device);

            let mut swapchain = Self {
                gpu_context: Arc::clone(&gpu_context),
                surface,
                swapchain: vk::SwapchainKHR::null(),
                swapchain_loader,
                images: Vec::new(),
                surface_format,
                extent: vk::Extent2D::default(),
                present_mode,
            };

            // On failure, drop destroys the surface
            swapchain.build(extent)?;

            engine_info!(
                SOURCE,
                "Swapchain created: {}x{}, {} images, {:?}, {:?}",
                swapchain.extent.width,
                swapchain.extent.height,
                swapchain.images.len(),
                swapchain.surface_format.format,
                swapchain.present_mode
            );

            Ok(swapchain)
        }
    }

    /// (Re)build the swapchain, retiring the current one if any
    unsafe fn build(&mut self, requested: Extent2D) -> Result<()> {
        let capabilities = self
            .gpu_context
            .surface_loader
            .get_physical_device_surface_capabilities(self.gpu_context.physical_device, self.surface)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to get surface capabilities: {:?}", e);
                Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
            })?;

        let extent = choose_extent(&capabilities, requested);
        let old_swapchain = self.swapchain;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = self
            .swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
            })?;

        // Destroy old swapchain
        if old_swapchain != vk::SwapchainKHR::null() {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = swapchain;
        self.extent = extent;

        self.images = self
            .swapchain_loader
            .get_swapchain_images(swapchain)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to get swapchain images: {:?}", e);
                Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
            })?;

        Ok(())
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(
        &mut self,
        signal: SemaphoreHandle,
        timeout: Duration,
    ) -> Result<(u32, SurfaceStatus)> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);

        unsafe {
            match self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                vk::Semaphore::from_raw(signal.raw()),
                vk::Fence::null(),
            ) {
                Ok((index, false)) => Ok((index, SurfaceStatus::Optimal)),
                Ok((index, true)) => Ok((index, SurfaceStatus::Suboptimal)),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok((0, SurfaceStatus::OutOfDate)),
                Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                    engine_error!(SOURCE, "No swapchain image became available within {:?}", timeout);
                    Err(Error::Timeout(format!(
                        "swapchain image acquisition exceeded {:?}",
                        timeout
                    )))
                }
                Err(e) => Err(engine_err!(SOURCE, "Failed to acquire next swapchain image: {:?}", e)),
            }
        }
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<SurfaceStatus> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [vk::Semaphore::from_raw(wait.raw())];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            match self
                .swapchain_loader
                .queue_present(self.gpu_context.present_queue, &present_info)
            {
                Ok(false) => Ok(SurfaceStatus::Optimal),
                Ok(true) => Ok(SurfaceStatus::Suboptimal),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
                Err(e) => Err(engine_err!(SOURCE, "Failed to present swapchain image: {:?}", e)),
            }
        }
    }

    fn image(&self, image_index: u32) -> Result<ImageHandle> {
        match self.images.get(image_index as usize) {
            Some(image) => Ok(ImageHandle(image.as_raw())),
            None => engine_bail!(
                SOURCE,
                "image index {} out of range (count: {})",
                image_index,
                self.images.len()
            ),
        }
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        unsafe {
            self.gpu_context.device.device_wait_idle().map_err(|e| {
                engine_err!(SOURCE, "Failed to wait idle before swapchain recreate: {:?}", e)
            })?;

            self.build(extent)?;
        }

        engine_info!(
            SOURCE,
            "Swapchain recreated: {}x{}",
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    fn extent(&self) -> Extent2D {
        Extent2D::new(self.extent.width, self.extent.height)
    }

    fn format(&self) -> ImageFormat {
        vk_format_to_format(self.surface_format.format).unwrap_or(ImageFormat::B8G8R8A8_UNORM)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.gpu_context.device.device_wait_idle().ok();

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }

            self.gpu_context.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
