//! Image layout transitions and scaled copies
//!
//! Barriers here are deliberately coarse: every transition waits on all
//! prior commands and blocks all later ones. The pure builders return the
//! barrier or blit so they can be inspected without a device.

use crate::graphics_device::{
    AccessFlags, BlitRegion, CommandContextHandle, Extent2D, Filter, GraphicsDevice,
    ImageAspect, ImageBarrier, ImageHandle, ImageLayout, PipelineStages,
};

/// Barrier moving `image` from `from` to `to`
///
/// The aspect follows the target layout: depth for depth attachments,
/// color otherwise.
pub fn image_barrier(image: ImageHandle, from: ImageLayout, to: ImageLayout) -> ImageBarrier {
    ImageBarrier {
        image,
        src_stage: PipelineStages::ALL_COMMANDS,
        src_access: AccessFlags::MEMORY_WRITE,
        dst_stage: PipelineStages::ALL_COMMANDS,
        dst_access: AccessFlags::MEMORY_WRITE | AccessFlags::MEMORY_READ,
        old_layout: from,
        new_layout: to,
        aspect: to.aspect(),
    }
}

/// Linear-filtered whole-image blit from `src` to `dst`
pub fn blit_region(
    src: ImageHandle,
    dst: ImageHandle,
    src_extent: Extent2D,
    dst_extent: Extent2D,
) -> BlitRegion {
    BlitRegion {
        src,
        dst,
        src_extent,
        dst_extent,
        filter: Filter::Linear,
        aspect: ImageAspect::COLOR,
    }
}

/// Record a layout transition
pub fn transition(
    device: &mut dyn GraphicsDevice,
    cmd: CommandContextHandle,
    image: ImageHandle,
    from: ImageLayout,
    to: ImageLayout,
) {
    device.cmd_pipeline_barrier(cmd, &image_barrier(image, from, to));
}

/// Record a scaled copy
///
/// `src` must be in TRANSFER_SRC layout and `dst` in TRANSFER_DST.
pub fn copy_scaled(
    device: &mut dyn GraphicsDevice,
    cmd: CommandContextHandle,
    src: ImageHandle,
    dst: ImageHandle,
    src_extent: Extent2D,
    dst_extent: Extent2D,
) {
    device.cmd_blit_image(cmd, &blit_region(src, dst, src_extent, dst_extent));
}

#[cfg(test)]
#[path = "image_transitions_tests.rs"]
mod tests;
