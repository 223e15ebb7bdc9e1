/// Mock GraphicsDevice and Swapchain for unit tests (no GPU required)
///
/// Every call is appended to a shared event log so tests can assert on
/// ordering after the device has been moved into an `Engine` or `FramePacer`.
/// Fences signal as soon as a submission naming them is made, unless
/// `auto_signal` is turned off.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::*;

// ============================================================================
// Shared state
// ============================================================================

#[derive(Debug)]
pub struct MockState {
    /// Every call, in order
    pub events: Vec<String>,
    /// Objects created and not yet destroyed
    pub live: Vec<GpuResource>,
    /// Objects destroyed, in destruction order
    pub destroyed: Vec<GpuResource>,
    /// Fence handle -> signaled
    pub fences: FxHashMap<u64, bool>,
    /// Descriptor pool handle -> (max sets, allocated sets)
    pub pools: FxHashMap<u64, (u32, u32)>,
    /// Signal fences on submit
    pub auto_signal: bool,
    /// Make the next `submit` fail with a backend error
    pub fail_submit: bool,
    /// Make `create_descriptor_pool` fail with out-of-memory
    pub fail_pool_creation: bool,
    pub submit_count: u64,
    next_handle: u64,
}

impl MockState {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            live: Vec::new(),
            destroyed: Vec::new(),
            fences: FxHashMap::default(),
            pools: FxHashMap::default(),
            auto_signal: true,
            fail_submit: false,
            fail_pool_creation: false,
            submit_count: 0,
            next_handle: 1,
        }
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn push(&mut self, event: String) {
        self.events.push(event);
    }

    /// Position of the first event equal to `event`, searching from `from`
    pub fn position_from(&self, from: usize, event: &str) -> Option<usize> {
        self.events[from..].iter().position(|e| e == event).map(|i| i + from)
    }

    /// Number of events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub type SharedMockState = Arc<Mutex<MockState>>;

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: SharedMockState,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockState::new())) }
    }

    /// Handle on the shared state, valid after the device is moved away
    pub fn state(&self) -> SharedMockState {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.lock();
        let fence = FenceHandle(state.next());
        state.fences.insert(fence.0, signaled);
        state.live.push(GpuResource::Fence(fence));
        state.push(format!("create_fence({}, signaled={})", fence.0, signaled));
        Ok(fence)
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let mut state = self.lock();
        let semaphore = SemaphoreHandle(state.next());
        state.live.push(GpuResource::Semaphore(semaphore));
        state.push(format!("create_semaphore({})", semaphore.0));
        Ok(semaphore)
    }

    fn wait_for_fence(&mut self, fence: FenceHandle, _timeout: Duration) -> Result<WaitStatus> {
        let mut state = self.lock();
        state.push(format!("wait_for_fence({})", fence.0));
        match state.fences.get(&fence.0) {
            Some(true) => Ok(WaitStatus::Signaled),
            Some(false) => Ok(WaitStatus::TimedOut),
            None => Err(Error::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()> {
        let mut state = self.lock();
        state.push(format!("reset_fence({})", fence.0));
        state.fences.insert(fence.0, false);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.lock().push("wait_idle".to_string());
        Ok(())
    }

    fn create_command_context(&mut self) -> Result<CommandContextHandle> {
        let mut state = self.lock();
        let cmd = CommandContextHandle(state.next());
        state.live.push(GpuResource::CommandContext(cmd));
        state.push(format!("create_command_context({})", cmd.0));
        Ok(cmd)
    }

    fn begin_commands(&mut self, cmd: CommandContextHandle) -> Result<()> {
        self.lock().push(format!("begin_commands({})", cmd.0));
        Ok(())
    }

    fn end_commands(&mut self, cmd: CommandContextHandle) -> Result<()> {
        self.lock().push(format!("end_commands({})", cmd.0));
        Ok(())
    }

    fn submit(&mut self, submit: &SubmitDesc) -> Result<()> {
        let mut state = self.lock();
        if state.fail_submit {
            state.fail_submit = false;
            state.push(format!("submit_failed({})", submit.cmd.0));
            return Err(Error::BackendError("mock submit failure".to_string()));
        }
        state.submit_count += 1;
        let waits: Vec<String> = submit.wait.iter()
            .map(|w| format!("{}@{:?}", w.semaphore.0, w.stage))
            .collect();
        let signals: Vec<String> = submit.signal.iter()
            .map(|s| format!("{}@{:?}", s.semaphore.0, s.stage))
            .collect();
        state.push(format!(
            "submit({}, wait=[{}], signal=[{}])",
            submit.cmd.0,
            waits.join(","),
            signals.join(",")
        ));
        if let Some(fence) = submit.fence {
            if state.auto_signal {
                state.fences.insert(fence.0, true);
            }
        }
        Ok(())
    }

    fn cmd_pipeline_barrier(&mut self, cmd: CommandContextHandle, barrier: &ImageBarrier) {
        self.lock().push(format!(
            "barrier({}, image={}, {:?}->{:?})",
            cmd.0, barrier.image.0, barrier.old_layout, barrier.new_layout
        ));
    }

    fn cmd_blit_image(&mut self, cmd: CommandContextHandle, blit: &BlitRegion) {
        self.lock().push(format!(
            "blit({}, {}->{}, {}x{}->{}x{}, {:?})",
            cmd.0,
            blit.src.0,
            blit.dst.0,
            blit.src_extent.width,
            blit.src_extent.height,
            blit.dst_extent.width,
            blit.dst_extent.height,
            blit.filter
        ));
    }

    fn cmd_clear_color_image(
        &mut self,
        cmd: CommandContextHandle,
        image: ImageHandle,
        layout: ImageLayout,
        color: [f32; 4],
    ) {
        self.lock().push(format!(
            "clear({}, image={}, {:?}, [{:.3},{:.3},{:.3},{:.3}])",
            cmd.0, image.0, layout, color[0], color[1], color[2], color[3]
        ));
    }

    fn cmd_bind_compute_pipeline(&mut self, cmd: CommandContextHandle, pipeline: &ComputePipeline) {
        self.lock().push(format!("bind_compute_pipeline({}, {})", cmd.0, pipeline.pipeline.0));
    }

    fn cmd_bind_compute_descriptor_set(
        &mut self,
        cmd: CommandContextHandle,
        _layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    ) {
        self.lock().push(format!("bind_descriptor_set({}, {})", cmd.0, set.0));
    }

    fn cmd_dispatch(&mut self, cmd: CommandContextHandle, x: u32, y: u32, z: u32) {
        self.lock().push(format!("dispatch({}, {}, {}, {})", cmd.0, x, y, z));
    }

    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle> {
        let mut state = self.lock();
        if state.fail_pool_creation {
            state.push("create_descriptor_pool_failed".to_string());
            return Err(Error::OutOfMemory);
        }
        let pool = DescriptorPoolHandle(state.next());
        state.pools.insert(pool.0, (max_sets, 0));
        state.live.push(GpuResource::DescriptorPool(pool));
        let sizes: Vec<String> = sizes.iter()
            .map(|s| format!("{:?}={}", s.kind, s.count))
            .collect();
        state.push(format!(
            "create_descriptor_pool({}, max_sets={}, [{}])",
            pool.0,
            max_sets,
            sizes.join(",")
        ));
        Ok(pool)
    }

    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()> {
        let mut state = self.lock();
        state.push(format!("reset_descriptor_pool({})", pool.0));
        match state.pools.get_mut(&pool.0) {
            Some(entry) => {
                entry.1 = 0;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown pool {}", pool.0))),
        }
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let mut state = self.lock();
        let (max_sets, used) = match state.pools.get(&pool.0) {
            Some(entry) => *entry,
            None => return Err(Error::InvalidResource(format!("unknown pool {}", pool.0))),
        };
        if used >= max_sets {
            state.push(format!("allocate_descriptor_set_failed({})", pool.0));
            return Err(Error::PoolExhausted(format!("pool {} is full", pool.0)));
        }
        state.pools.insert(pool.0, (max_sets, used + 1));
        let set = DescriptorSetHandle(state.next());
        state.push(format!("allocate_descriptor_set({}, layout={}) -> {}", pool.0, layout.0, set.0));
        Ok(set)
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.lock();
        let layout = DescriptorSetLayoutHandle(state.next());
        state.live.push(GpuResource::DescriptorSetLayout(layout));
        state.push(format!(
            "create_descriptor_set_layout({}, bindings={})",
            layout.0,
            desc.bindings.len()
        ));
        Ok(layout)
    }

    fn write_storage_image(&mut self, set: DescriptorSetHandle, binding: u32, view: ImageViewHandle) {
        self.lock().push(format!("write_storage_image({}, binding={}, view={})", set.0, binding, view.0));
    }

    fn create_draw_target(&mut self, desc: &DrawTargetDesc) -> Result<DrawTarget> {
        let mut state = self.lock();
        let image = ImageHandle(state.next());
        let view = ImageViewHandle(state.next());
        let target = DrawTarget {
            image,
            view,
            format: desc.format,
            extent: desc.extent,
        };
        state.live.push(GpuResource::DrawTarget(target));
        state.push(format!(
            "create_draw_target({}, {}x{}, {:?})",
            image.0, desc.extent.width, desc.extent.height, desc.format
        ));
        Ok(target)
    }

    fn create_compute_pipeline(
        &mut self,
        spirv: &[u32],
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<ComputePipeline> {
        let mut state = self.lock();
        let pipeline = ComputePipeline {
            pipeline: PipelineHandle(state.next()),
            layout: PipelineLayoutHandle(state.next()),
        };
        state.live.push(GpuResource::PipelineLayout(pipeline.layout));
        state.live.push(GpuResource::Pipeline(pipeline.pipeline));
        state.push(format!(
            "create_compute_pipeline({}, words={}, set_layouts={})",
            pipeline.pipeline.0,
            spirv.len(),
            set_layouts.len()
        ));
        Ok(pipeline)
    }

    fn destroy_resource(&mut self, resource: GpuResource) {
        let mut state = self.lock();
        state.push(format!("destroy({:?})", resource));
        if let Some(index) = state.live.iter().position(|r| *r == resource) {
            state.live.remove(index);
        }
        if let GpuResource::Fence(fence) = resource {
            state.fences.remove(&fence.0);
        }
        if let GpuResource::DescriptorPool(pool) = resource {
            state.pools.remove(&pool.0);
        }
        state.destroyed.push(resource);
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    state: SharedMockState,
    extent: Extent2D,
    images: Vec<ImageHandle>,
    next_image: u32,
    /// Statuses returned by the next acquisitions (Optimal when empty)
    pub acquire_script: VecDeque<SurfaceStatus>,
    /// Statuses returned by the next presentations (Optimal when empty)
    pub present_script: VecDeque<SurfaceStatus>,
    /// Make every acquisition time out
    pub acquire_times_out: bool,
}

impl MockSwapchain {
    /// Swapchain with three images that logs into the device's event log
    pub fn new(device: &MockGraphicsDevice, extent: Extent2D) -> Self {
        let state = device.state();
        let images = {
            let mut guard = state.lock().unwrap();
            (0..3).map(|_| ImageHandle(guard.next())).collect()
        };
        Self {
            state,
            extent,
            images,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            acquire_times_out: false,
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(
        &mut self,
        signal: SemaphoreHandle,
        _timeout: Duration,
    ) -> Result<(u32, SurfaceStatus)> {
        let mut state = self.state.lock().unwrap();
        if self.acquire_times_out {
            state.push(format!("acquire_timeout({})", signal.0));
            return Err(Error::Timeout("mock acquire".to_string()));
        }
        let status = self.acquire_script.pop_front().unwrap_or(SurfaceStatus::Optimal);
        let index = self.next_image;
        if status != SurfaceStatus::OutOfDate {
            self.next_image = (self.next_image + 1) % self.images.len() as u32;
        }
        state.push(format!("acquire({}, signal={}, {:?})", index, signal.0, status));
        Ok((index, status))
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<SurfaceStatus> {
        let status = self.present_script.pop_front().unwrap_or(SurfaceStatus::Optimal);
        self.state.lock().unwrap()
            .push(format!("present({}, wait={}, {:?})", image_index, wait.0, status));
        Ok(status)
    }

    fn image(&self, image_index: u32) -> Result<ImageHandle> {
        self.images.get(image_index as usize).copied().ok_or_else(|| {
            Error::InvalidResource(format!("swapchain image {} out of range", image_index))
        })
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        self.state.lock().unwrap()
            .push(format!("recreate_swapchain({}x{})", extent.width, extent.height));
        self.extent = extent;
        self.next_image = 0;
        Ok(())
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::B8G8R8A8_UNORM
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
