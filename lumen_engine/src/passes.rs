//! Background passes filling the draw target

use std::path::Path;
use glam::Vec4;
use crate::descriptor::{DescriptorSet, DescriptorSetLayout, LayoutBuilder, ResourcePool};
use crate::error::Result;
use crate::frame::{DrawPass, FrameContext};
use crate::graphics_device::{
    ComputePipeline, DescriptorKind, DrawTarget, GraphicsDevice, GpuResource, ImageLayout,
    ShaderStageFlags,
};
use crate::release_queue::DeferredReleaseQueue;
use crate::shader::load_spirv;

/// Local workgroup size of the gradient shader, in both dimensions
pub const GRADIENT_WORKGROUP_SIZE: u32 = 16;

/// Compute shader writing every pixel of the draw target
///
/// The shader reads the target as a storage image at set 0, binding 0.
/// The set is allocated again whenever the engine pool is reset.
pub struct GradientPass {
    pipeline: ComputePipeline,
    layout: DescriptorSetLayout,
    target: DrawTarget,
    descriptor_set: DescriptorSet,
}

impl GradientPass {
    /// Load the shader from disk and build the pass
    ///
    /// # Errors
    ///
    /// `ShaderLoadFailed` when the shader cannot be read; nothing is created
    /// on the device in that case.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        pool: &mut ResourcePool,
        target: &DrawTarget,
        shader_path: impl AsRef<Path>,
        global: &mut DeferredReleaseQueue,
    ) -> Result<Self> {
        let spirv = load_spirv(shader_path)?;
        Self::from_spirv(device, pool, target, &spirv, global)
    }

    /// Build the pass from SPIR-V already in memory
    pub fn from_spirv(
        device: &mut dyn GraphicsDevice,
        pool: &mut ResourcePool,
        target: &DrawTarget,
        spirv: &[u32],
        global: &mut DeferredReleaseQueue,
    ) -> Result<Self> {
        let mut builder = LayoutBuilder::new();
        builder.add_binding(0, DescriptorKind::StorageImage);
        let layout = builder.create(device, ShaderStageFlags::COMPUTE)?;
        global.push(GpuResource::from(&layout));

        let descriptor_set = Self::bind_target(device, pool, &layout, target)?;

        let pipeline = device.create_compute_pipeline(spirv, &[layout.handle()])?;
        global.push(GpuResource::PipelineLayout(pipeline.layout));
        global.push(GpuResource::Pipeline(pipeline.pipeline));

        Ok(Self { pipeline, layout, target: *target, descriptor_set })
    }

    fn bind_target(
        device: &mut dyn GraphicsDevice,
        pool: &mut ResourcePool,
        layout: &DescriptorSetLayout,
        target: &DrawTarget,
    ) -> Result<DescriptorSet> {
        let set = pool.allocate(device, layout)?;
        pool.write_storage_image(device, &set, 0, target.view)?;
        Ok(set)
    }

    /// Workgroups needed to cover `width` x `height`
    pub fn group_counts(width: u32, height: u32) -> (u32, u32) {
        (
            width.div_ceil(GRADIENT_WORKGROUP_SIZE),
            height.div_ceil(GRADIENT_WORKGROUP_SIZE),
        )
    }

    pub fn descriptor_set(&self) -> &DescriptorSet {
        &self.descriptor_set
    }
}

impl DrawPass for GradientPass {
    fn name(&self) -> &str {
        "gradient"
    }

    fn record(&mut self, device: &mut dyn GraphicsDevice, frame: &mut FrameContext) -> Result<()> {
        let (x, y) = Self::group_counts(frame.draw_extent.width, frame.draw_extent.height);
        device.cmd_bind_compute_pipeline(frame.cmd, &self.pipeline);
        device.cmd_bind_compute_descriptor_set(frame.cmd, self.pipeline.layout, self.descriptor_set.handle);
        device.cmd_dispatch(frame.cmd, x, y, 1);
        Ok(())
    }

    fn descriptors_reset(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pool: &mut ResourcePool,
    ) -> Result<()> {
        self.descriptor_set = Self::bind_target(device, pool, &self.layout, &self.target)?;
        Ok(())
    }
}

/// Clear of the draw target pulsing in blue
pub struct FlashPass;

impl FlashPass {
    /// Clear color for a frame: blue follows `|sin(frame / 720)|`
    pub fn color(frame_number: u64) -> Vec4 {
        let flash = (frame_number as f32 / 720.0).sin().abs();
        Vec4::new(0.0, 0.0, flash, 1.0)
    }
}

impl DrawPass for FlashPass {
    fn name(&self) -> &str {
        "flash"
    }

    fn record(&mut self, device: &mut dyn GraphicsDevice, frame: &mut FrameContext) -> Result<()> {
        let color = Self::color(frame.frame_number);
        device.cmd_clear_color_image(
            frame.cmd,
            frame.draw_target.image,
            ImageLayout::General,
            color.to_array(),
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
