//! Frame pacing
//!
//! A ring of frame slots lets the CPU record frame K+1 while the GPU still
//! executes frame K. Each slot owns its synchronization objects and a
//! release queue for objects that only have to outlive that slot's GPU work.
//!
//! Per frame, in order:
//! 1. wait for the slot's fence (its previous submission has retired)
//! 2. flush the slot's release queue
//! 3. acquire a swapchain image, then reset the fence
//! 4. record: draw target -> passes -> blit into the swapchain image
//! 5. submit (signals the fence) and present

use std::time::Duration;
use crate::descriptor::ResourcePool;
use crate::error::{Error, Result};
use crate::graphics_device::{
    CommandContextHandle, DrawTarget, Extent2D, FenceHandle, GraphicsDevice, GpuResource,
    ImageLayout, PipelineStages, SemaphoreHandle, SemaphoreStage, SubmitDesc, SurfaceStatus,
    Swapchain, WaitStatus,
};
use crate::image_transitions::{copy_scaled, transition};
use crate::release_queue::{DeferredReleaseQueue, ReleaseAction};

// ============================================================================
// Draw passes
// ============================================================================

/// Work recorded into every frame, between the draw target entering GENERAL
/// layout and the blit to the swapchain
pub trait DrawPass {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Record this pass into the current frame
    fn record(&mut self, device: &mut dyn GraphicsDevice, frame: &mut FrameContext) -> Result<()>;

    /// The engine descriptor pool was reset: every set this pass holds is
    /// gone and must be allocated again from `pool` before the next frame
    fn descriptors_reset(
        &mut self,
        _device: &mut dyn GraphicsDevice,
        _pool: &mut ResourcePool,
    ) -> Result<()> {
        Ok(())
    }
}

/// What a draw pass sees of the frame being recorded
pub struct FrameContext<'a> {
    /// Logical frame number (monotonic)
    pub frame_number: u64,
    /// Slot this frame is recorded in
    pub slot_index: usize,
    /// Command context being recorded
    pub cmd: CommandContextHandle,
    /// Draw target, in GENERAL layout
    pub draw_target: DrawTarget,
    /// Area of the draw target being rendered
    pub draw_extent: Extent2D,
    releases: &'a mut DeferredReleaseQueue,
}

impl FrameContext<'_> {
    /// Release something once this slot's GPU work has retired
    ///
    /// The action runs when the slot comes around again, after its fence wait.
    pub fn defer_release(&mut self, action: impl Into<ReleaseAction>) {
        self.releases.push(action);
    }
}

// ============================================================================
// Frame slots
// ============================================================================

/// Per-in-flight-frame resources
#[derive(Debug)]
pub struct FrameSlot {
    cmd: CommandContextHandle,
    fence: FenceHandle,
    acquire_semaphore: SemaphoreHandle,
    present_semaphore: SemaphoreHandle,
    releases: DeferredReleaseQueue,
}

impl FrameSlot {
    /// Create the slot's objects; their destruction is queued on `global`
    fn new(device: &mut dyn GraphicsDevice, global: &mut DeferredReleaseQueue) -> Result<Self> {
        let cmd = device.create_command_context()?;
        global.push(GpuResource::CommandContext(cmd));

        // Signaled so the first wait on the slot returns at once
        let fence = device.create_fence(true)?;
        global.push(GpuResource::Fence(fence));

        let acquire_semaphore = device.create_semaphore()?;
        global.push(GpuResource::Semaphore(acquire_semaphore));

        let present_semaphore = device.create_semaphore()?;
        global.push(GpuResource::Semaphore(present_semaphore));

        Ok(Self {
            cmd,
            fence,
            acquire_semaphore,
            present_semaphore,
            releases: DeferredReleaseQueue::new(),
        })
    }

    pub fn command_context(&self) -> CommandContextHandle {
        self.cmd
    }

    pub fn fence(&self) -> FenceHandle {
        self.fence
    }

    pub fn acquire_semaphore(&self) -> SemaphoreHandle {
        self.acquire_semaphore
    }

    pub fn present_semaphore(&self) -> SemaphoreHandle {
        self.present_semaphore
    }

    /// Number of releases waiting for this slot's next turn
    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }
}

// ============================================================================
// Frame pacer
// ============================================================================

/// Ring of frame slots driving the per-frame protocol
#[derive(Debug)]
pub struct FramePacer {
    slots: Vec<FrameSlot>,
    frame_number: u64,
    fence_timeout: Duration,
    acquire_timeout: Duration,
}

impl FramePacer {
    /// Create `frames_in_flight` slots
    ///
    /// Slot objects are destroyed through `global` at shutdown.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        frames_in_flight: usize,
        fence_timeout: Duration,
        acquire_timeout: Duration,
        global: &mut DeferredReleaseQueue,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "At least one frame slot is required".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSlot::new(device, global)?);
        }

        crate::engine_debug!(
            "lumen::FramePacer",
            "Created {} frame slots (fence timeout {:?}, acquire timeout {:?})",
            frames_in_flight,
            fence_timeout,
            acquire_timeout
        );

        Ok(Self {
            slots,
            frame_number: 0,
            fence_timeout,
            acquire_timeout,
        })
    }

    /// Record, submit and present one frame
    ///
    /// # Errors
    ///
    /// `SwapchainOutOfDate` when acquisition or presentation finds the
    /// surface out of date; the swapchain must be recreated. Anything else
    /// is fatal.
    pub fn draw_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        swapchain: &mut dyn Swapchain,
        draw_target: &DrawTarget,
        passes: &mut [Box<dyn DrawPass>],
    ) -> Result<()> {
        let result = self.run_frame(device, swapchain, draw_target, passes);
        if let Err(err) = &result {
            if !err.is_recoverable() {
                crate::engine_error!(
                    "lumen::FramePacer",
                    "Frame {} failed: {}",
                    self.frame_number,
                    err
                );
            }
        }
        result
    }

    fn run_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        swapchain: &mut dyn Swapchain,
        draw_target: &DrawTarget,
        passes: &mut [Box<dyn DrawPass>],
    ) -> Result<()> {
        let frame_number = self.frame_number;
        let slot_index = self.current_slot_index();
        let slot = &mut self.slots[slot_index];

        crate::engine_trace!(
            "lumen::FramePacer",
            "Frame {} on slot {}",
            frame_number,
            slot_index
        );

        // 1. Previous use of this slot must have retired
        if device.wait_for_fence(slot.fence, self.fence_timeout)? == WaitStatus::TimedOut {
            return Err(Error::Timeout(format!(
                "render fence of slot {} after {:?}",
                slot_index, self.fence_timeout
            )));
        }

        // 2. Nothing the GPU could still read from this slot remains
        slot.releases.flush(device);

        // 3. Fence is only reset once a frame is sure to be submitted
        let (image_index, status) =
            swapchain.acquire_next_image(slot.acquire_semaphore, self.acquire_timeout)?;
        if status == SurfaceStatus::OutOfDate {
            return Err(Error::SwapchainOutOfDate);
        }
        device.reset_fence(slot.fence)?;

        // 4. Record
        let cmd = slot.cmd;
        let swapchain_image = swapchain.image(image_index)?;
        let swapchain_extent = swapchain.extent();
        let draw_extent = draw_target.extent;

        device.begin_commands(cmd)?;

        transition(device, cmd, draw_target.image, ImageLayout::Undefined, ImageLayout::General);

        let mut context = FrameContext {
            frame_number,
            slot_index,
            cmd,
            draw_target: *draw_target,
            draw_extent,
            releases: &mut slot.releases,
        };
        for pass in passes.iter_mut() {
            pass.record(device, &mut context)?;
        }

        transition(
            device,
            cmd,
            draw_target.image,
            ImageLayout::General,
            ImageLayout::TransferSrcOptimal,
        );
        transition(
            device,
            cmd,
            swapchain_image,
            ImageLayout::Undefined,
            ImageLayout::TransferDstOptimal,
        );
        copy_scaled(device, cmd, draw_target.image, swapchain_image, draw_extent, swapchain_extent);
        transition(
            device,
            cmd,
            swapchain_image,
            ImageLayout::TransferDstOptimal,
            ImageLayout::PresentSrc,
        );

        device.end_commands(cmd)?;

        // 5. Submit and present
        let wait = [SemaphoreStage {
            semaphore: slot.acquire_semaphore,
            stage: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        }];
        let signal = [SemaphoreStage {
            semaphore: slot.present_semaphore,
            stage: PipelineStages::ALL_GRAPHICS,
        }];
        device.submit(&SubmitDesc {
            cmd,
            wait: &wait,
            signal: &signal,
            fence: Some(slot.fence),
        })?;

        let status = swapchain.present(image_index, slot.present_semaphore)?;

        // The frame was submitted, so it counts even if presentation failed
        self.frame_number += 1;

        if status == SurfaceStatus::OutOfDate {
            return Err(Error::SwapchainOutOfDate);
        }
        Ok(())
    }

    /// Flush every slot's release queue
    ///
    /// Only valid once the device is idle.
    pub fn flush_all(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in &mut self.slots {
            slot.releases.flush(device);
        }
    }

    /// Frames submitted so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Slot the next frame will use
    pub fn current_slot_index(&self) -> usize {
        (self.frame_number % self.slots.len() as u64) as usize
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
