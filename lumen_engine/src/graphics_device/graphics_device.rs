/// GraphicsDevice trait - the narrow GPU interface the frame engine drives
///
/// The backend owns every GPU object; the core only holds handles and asks
/// the device to create, record into, submit and destroy them.

use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::types::*;

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The fence was signaled before the timeout
    Signaled,
    /// The timeout elapsed first
    TimedOut,
}

/// Semaphore wait or signal at a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreStage {
    pub semaphore: SemaphoreHandle,
    pub stage: PipelineStages,
}

/// One queue submission: a recorded command context plus its synchronization
#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc<'a> {
    pub cmd: CommandContextHandle,
    pub wait: &'a [SemaphoreStage],
    pub signal: &'a [SemaphoreStage],
    /// Fence signaled when the GPU has finished this submission
    pub fence: Option<FenceHandle>,
}

/// Image memory barrier with a layout change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub src_stage: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stage: PipelineStages,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub aspect: ImageAspect,
}

/// Whole-image blit between two images of possibly different extents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    pub src: ImageHandle,
    pub dst: ImageHandle,
    pub src_extent: Extent2D,
    pub dst_extent: Extent2D,
    pub filter: Filter,
    pub aspect: ImageAspect,
}

impl BlitRegion {
    /// Whether the blit resamples (source and destination extents differ)
    pub fn is_scaled(&self) -> bool {
        self.src_extent != self.dst_extent
    }
}

/// Kind of descriptor a binding holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorKind {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
}

/// Number of descriptors of one kind a pool can hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub kind: DescriptorKind,
    pub count: u32,
}

/// Single binding slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub count: u32,
}

/// Immutable description of a descriptor set layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
    pub visibility: ShaderStageFlags,
}

/// Description of an off-screen draw target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTargetDesc {
    pub format: ImageFormat,
    pub extent: Extent2D,
    pub usage: ImageUsage,
}

/// Off-screen image the frame is drawn into before being blitted to the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTarget {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub format: ImageFormat,
    pub extent: Extent2D,
}

/// Compute pipeline together with its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputePipeline {
    pub pipeline: PipelineHandle,
    pub layout: PipelineLayoutHandle,
}

/// Device-owned object that can be handed back for destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Fence(FenceHandle),
    Semaphore(SemaphoreHandle),
    CommandContext(CommandContextHandle),
    DescriptorPool(DescriptorPoolHandle),
    DescriptorSetLayout(DescriptorSetLayoutHandle),
    Pipeline(PipelineHandle),
    PipelineLayout(PipelineLayoutHandle),
    /// Image, its view and its memory
    DrawTarget(DrawTarget),
}

/// Graphics device
///
/// Every method is called from the single thread that drives the frame loop.
/// Recording methods (`cmd_*`) append to a context between `begin_commands`
/// and `end_commands` and cannot fail at record time.
pub trait GraphicsDevice {
    // ===== SYNCHRONIZATION =====

    /// Create a fence, optionally already signaled
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle>;

    /// Create a binary semaphore
    fn create_semaphore(&mut self) -> Result<SemaphoreHandle>;

    /// Block until the fence is signaled or `timeout` elapses
    fn wait_for_fence(&mut self, fence: FenceHandle, timeout: Duration) -> Result<WaitStatus>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()>;

    /// Block until the device has no pending work
    fn wait_idle(&mut self) -> Result<()>;

    // ===== COMMAND RECORDING =====

    /// Create a command context (pool + primary command buffer)
    fn create_command_context(&mut self) -> Result<CommandContextHandle>;

    /// Reset the context and begin a one-time-submit recording
    fn begin_commands(&mut self, cmd: CommandContextHandle) -> Result<()>;

    /// Finish recording
    fn end_commands(&mut self, cmd: CommandContextHandle) -> Result<()>;

    /// Submit a recorded context to the graphics queue
    fn submit(&mut self, submit: &SubmitDesc) -> Result<()>;

    fn cmd_pipeline_barrier(&mut self, cmd: CommandContextHandle, barrier: &ImageBarrier);

    fn cmd_blit_image(&mut self, cmd: CommandContextHandle, blit: &BlitRegion);

    /// Clear a color image that is in `layout` (GENERAL or TRANSFER_DST)
    fn cmd_clear_color_image(
        &mut self,
        cmd: CommandContextHandle,
        image: ImageHandle,
        layout: ImageLayout,
        color: [f32; 4],
    );

    fn cmd_bind_compute_pipeline(&mut self, cmd: CommandContextHandle, pipeline: &ComputePipeline);

    /// Bind a descriptor set at set index 0 of the compute bind point
    fn cmd_bind_compute_descriptor_set(
        &mut self,
        cmd: CommandContextHandle,
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    );

    fn cmd_dispatch(&mut self, cmd: CommandContextHandle, x: u32, y: u32, z: u32);

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle>;

    /// Return every set of the pool to it
    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()>;

    /// Allocate one set; a full pool reports `Error::PoolExhausted`
    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> Result<DescriptorSetLayoutHandle>;

    /// Point a storage-image binding at an image view in GENERAL layout
    fn write_storage_image(
        &mut self,
        set: DescriptorSetHandle,
        binding: u32,
        view: ImageViewHandle,
    );

    // ===== RESOURCES =====

    /// Create a GPU-only draw target image and its view
    fn create_draw_target(&mut self, desc: &DrawTargetDesc) -> Result<DrawTarget>;

    /// Build a compute pipeline from SPIR-V words (entry point `main`)
    fn create_compute_pipeline(
        &mut self,
        spirv: &[u32],
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<ComputePipeline>;

    /// Destroy a device-owned object; the GPU must no longer use it
    fn destroy_resource(&mut self, resource: GpuResource);
}
