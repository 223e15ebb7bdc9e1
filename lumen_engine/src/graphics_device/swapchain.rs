/// Swapchain trait - for window presentation

use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::{Extent2D, ImageFormat, ImageHandle, SemaphoreHandle};

/// How well the swapchain still matches its surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Exact match
    Optimal,
    /// Usable, but the surface properties changed (e.g. a resize in progress)
    Suboptimal,
    /// Unusable until `recreate` is called
    OutOfDate,
}

/// Swapchain for presenting rendered images to a window
///
/// Manages a set of images that are presented to the screen in sequence.
/// Fatal failures are returned as `Err`; out-of-date surfaces are reported
/// through `SurfaceStatus` so the caller can recreate.
pub trait Swapchain {
    /// Acquire the next presentable image
    ///
    /// # Arguments
    ///
    /// * `signal` - Semaphore signaled when the image is ready to be written
    /// * `timeout` - Maximum time to block; elapsing is `Error::Timeout`
    ///
    /// The image index is meaningless when the status is `OutOfDate`.
    fn acquire_next_image(
        &mut self,
        signal: SemaphoreHandle,
        timeout: Duration,
    ) -> Result<(u32, SurfaceStatus)>;

    /// Present an acquired image once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<SurfaceStatus>;

    /// Image behind an acquired index
    fn image(&self, image_index: u32) -> Result<ImageHandle>;

    /// Recreate the swapchain (e.g., after window resize)
    ///
    /// The device must be idle with respect to the old images.
    fn recreate(&mut self, extent: Extent2D) -> Result<()>;

    /// Extent of the swapchain images in pixels
    fn extent(&self) -> Extent2D;

    /// Pixel format of the swapchain images
    fn format(&self) -> ImageFormat;

    /// Number of images in the swapchain
    fn image_count(&self) -> usize;
}
