//! Unit tests for frame.rs
//!
//! The mock device logs every call, so the per-frame protocol is checked by
//! the order of events in that log.

use crate::frame::*;
use crate::error::{Error, Result};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockSwapchain, SharedMockState};
use crate::graphics_device::*;
use crate::release_queue::{DeferredReleaseQueue, ReleaseAction};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

struct Harness {
    device: MockGraphicsDevice,
    swapchain: MockSwapchain,
    state: SharedMockState,
    pacer: FramePacer,
    global: DeferredReleaseQueue,
    target: DrawTarget,
}

impl Harness {
    fn new(frames_in_flight: usize) -> Self {
        let mut device = MockGraphicsDevice::new();
        let state = device.state();
        let swapchain = MockSwapchain::new(&device, Extent2D::new(1024, 768));
        let mut global = DeferredReleaseQueue::new();
        let pacer = FramePacer::new(&mut device, frames_in_flight, TIMEOUT, TIMEOUT, &mut global).unwrap();
        let target = device
            .create_draw_target(&DrawTargetDesc {
                format: ImageFormat::R16G16B16A16_SFLOAT,
                extent: Extent2D::new(800, 600),
                usage: ImageUsage::STORAGE | ImageUsage::TRANSFER_SRC,
            })
            .unwrap();
        Self { device, swapchain, state, pacer, global, target }
    }

    fn draw(&mut self, passes: &mut [Box<dyn DrawPass>]) -> Result<()> {
        self.pacer.draw_frame(&mut self.device, &mut self.swapchain, &self.target, passes)
    }

    fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    fn slot(&self, index: usize) -> &FrameSlot {
        self.pacer.slot(index).unwrap()
    }
}

/// Defers one logging release per frame
struct DeferringPass {
    state: SharedMockState,
}

impl DrawPass for DeferringPass {
    fn name(&self) -> &str {
        "deferring"
    }

    fn record(&mut self, _device: &mut dyn GraphicsDevice, frame: &mut FrameContext) -> Result<()> {
        let state = Arc::clone(&self.state);
        let frame_number = frame.frame_number;
        frame.defer_release(ReleaseAction::callback(move |_| {
            state.lock().unwrap().events.push(format!("release({})", frame_number));
        }));
        Ok(())
    }
}

/// Logs the context it was given
struct ProbePass {
    state: SharedMockState,
}

impl DrawPass for ProbePass {
    fn name(&self) -> &str {
        "probe"
    }

    fn record(&mut self, _device: &mut dyn GraphicsDevice, frame: &mut FrameContext) -> Result<()> {
        self.state.lock().unwrap().events.push(format!(
            "pass(frame={}, slot={}, cmd={}, extent={}x{})",
            frame.frame_number,
            frame.slot_index,
            frame.cmd.0,
            frame.draw_extent.width,
            frame.draw_extent.height
        ));
        Ok(())
    }
}

struct FailingPass;

impl DrawPass for FailingPass {
    fn name(&self) -> &str {
        "failing"
    }

    fn record(&mut self, _device: &mut dyn GraphicsDevice, _frame: &mut FrameContext) -> Result<()> {
        Err(Error::BackendError("pass failed".to_string()))
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_creates_signaled_slots_and_queues_their_release() {
    let h = Harness::new(2);
    assert_eq!(h.pacer.slot_count(), 2);
    assert_eq!(h.pacer.frame_number(), 0);
    // command context, fence and two semaphores per slot
    assert_eq!(h.global.len(), 8);

    let state = h.state.lock().unwrap();
    assert_eq!(state.count("create_fence"), 2);
    assert!(state.events.iter()
        .filter(|e| e.starts_with("create_fence"))
        .all(|e| e.ends_with("signaled=true)")));
}

#[test]
fn test_zero_slots_rejected() {
    let mut device = MockGraphicsDevice::new();
    let mut global = DeferredReleaseQueue::new();
    let result = FramePacer::new(&mut device, 0, TIMEOUT, TIMEOUT, &mut global);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_global_flush_destroys_every_slot_object() {
    let mut h = Harness::new(3);
    h.global.flush(&mut h.device);
    let state = h.state.lock().unwrap();
    // only the draw target remains
    assert_eq!(state.live.len(), 1);
    assert_eq!(state.destroyed.len(), 12);
}

// ============================================================================
// Slot rotation
// ============================================================================

#[test]
fn test_slots_alternate_with_two_frames_in_flight() {
    let mut h = Harness::new(2);
    let cmds = [h.slot(0).command_context().0, h.slot(1).command_context().0];

    for k in 0..6u64 {
        assert_eq!(h.pacer.current_slot_index(), (k % 2) as usize);
        h.draw(&mut []).unwrap();
    }

    let submitted: Vec<u64> = h.events().iter()
        .filter(|e| e.starts_with("submit("))
        .map(|e| e["submit(".len()..].split(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(
        submitted,
        vec![cmds[0], cmds[1], cmds[0], cmds[1], cmds[0], cmds[1]]
    );
    assert_eq!(h.pacer.frame_number(), 6);
}

#[test]
fn test_three_frames_in_flight() {
    let mut h = Harness::new(3);
    let fences: Vec<u64> = (0..3).map(|i| h.slot(i).fence().0).collect();
    for _ in 0..6 {
        h.draw(&mut []).unwrap();
    }
    let waited: Vec<u64> = h.events().iter()
        .filter(|e| e.starts_with("wait_for_fence("))
        .map(|e| e["wait_for_fence(".len()..e.len() - 1].parse().unwrap())
        .collect();
    assert_eq!(waited, vec![fences[0], fences[1], fences[2], fences[0], fences[1], fences[2]]);
}

// ============================================================================
// Per-frame protocol
// ============================================================================

#[test]
fn test_frame_step_order() {
    let mut h = Harness::new(2);
    let mut passes: Vec<Box<dyn DrawPass>> = vec![Box::new(ProbePass { state: h.state.clone() })];
    let start = h.events().len();
    h.draw(&mut passes).unwrap();

    let fence = h.slot(0).fence().0;
    let cmd = h.slot(0).command_context().0;
    let acquire_sem = h.slot(0).acquire_semaphore().0;
    let present_sem = h.slot(0).present_semaphore().0;
    let target = h.target.image.0;
    let swap_image = h.swapchain.image(0).unwrap().0;

    let events = h.events()[start..].to_vec();
    let expected = vec![
        format!("wait_for_fence({})", fence),
        format!("acquire(0, signal={}, Optimal)", acquire_sem),
        format!("reset_fence({})", fence),
        format!("begin_commands({})", cmd),
        format!("barrier({}, image={}, Undefined->General)", cmd, target),
        format!("pass(frame=0, slot=0, cmd={}, extent=800x600)", cmd),
        format!("barrier({}, image={}, General->TransferSrcOptimal)", cmd, target),
        format!("barrier({}, image={}, Undefined->TransferDstOptimal)", cmd, swap_image),
        format!("blit({}, {}->{}, 800x600->1024x768, Linear)", cmd, target, swap_image),
        format!("barrier({}, image={}, TransferDstOptimal->PresentSrc)", cmd, swap_image),
        format!("end_commands({})", cmd),
    ];
    assert_eq!(&events[..expected.len()], &expected[..]);

    let submit = &events[expected.len()];
    assert!(submit.starts_with(&format!("submit({}, wait=[{}@", cmd, acquire_sem)));
    assert!(submit.contains("COLOR_ATTACHMENT_OUTPUT"));
    assert!(submit.contains(&format!("signal=[{}@", present_sem)));
    assert!(submit.contains("ALL_GRAPHICS"));

    assert_eq!(
        events[expected.len() + 1],
        format!("present(0, wait={}, Optimal)", present_sem)
    );
}

#[test]
fn test_slot_releases_wait_for_the_slot_fence() {
    let mut h = Harness::new(2);
    let mut passes: Vec<Box<dyn DrawPass>> = vec![Box::new(DeferringPass { state: h.state.clone() })];
    for _ in 0..3 {
        h.draw(&mut passes).unwrap();
    }

    let fence0 = format!("wait_for_fence({})", h.slot(0).fence().0);
    let events = h.events();
    let release0 = events.iter().position(|e| e == "release(0)").unwrap();

    // Frame 0's release runs in frame 2, right after slot 0's second fence wait
    let waits_before: Vec<usize> = events[..release0].iter()
        .enumerate()
        .filter(|(_, e)| **e == fence0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(waits_before.len(), 2);
    let first_submit = events.iter().position(|e| e.starts_with("submit(")).unwrap();
    assert!(waits_before[1] > first_submit);
    assert_eq!(waits_before[1] + 1, release0);

    // Frame 1's release has not run yet: slot 1 has not come around again
    assert!(!events.iter().any(|e| e == "release(1)"));
    assert_eq!(h.slot(1).pending_releases(), 1);
}

#[test]
fn test_ten_thousand_frames_keep_one_batch_per_slot() {
    let mut h = Harness::new(2);
    let mut passes: Vec<Box<dyn DrawPass>> = vec![Box::new(DeferringPass { state: h.state.clone() })];

    for _ in 0..10_000 {
        h.draw(&mut passes).unwrap();
        for slot in 0..2 {
            assert!(h.slot(slot).pending_releases() <= 1);
        }
    }

    assert_eq!(h.pacer.frame_number(), 10_000);
    let state = h.state.lock().unwrap();
    assert_eq!(state.submit_count, 10_000);
    // Every frame but the last one per slot has released
    assert_eq!(state.count("release("), 9_998);
}

#[test]
fn test_flush_all_runs_pending_slot_releases() {
    let mut h = Harness::new(2);
    let mut passes: Vec<Box<dyn DrawPass>> = vec![Box::new(DeferringPass { state: h.state.clone() })];
    h.draw(&mut passes).unwrap();
    h.draw(&mut passes).unwrap();

    h.pacer.flush_all(&mut h.device);

    assert_eq!(h.state.lock().unwrap().count("release("), 2);
    assert_eq!(h.slot(0).pending_releases(), 0);
    assert_eq!(h.slot(1).pending_releases(), 0);
}

// ============================================================================
// Surface conditions
// ============================================================================

#[test]
fn test_out_of_date_acquire_keeps_fence_signaled() {
    let mut h = Harness::new(2);
    h.swapchain.acquire_script.push_back(SurfaceStatus::OutOfDate);

    assert_eq!(h.draw(&mut []), Err(Error::SwapchainOutOfDate));
    assert_eq!(h.pacer.frame_number(), 0);
    assert_eq!(h.state.lock().unwrap().count("reset_fence"), 0);
    assert_eq!(h.state.lock().unwrap().submit_count, 0);

    // Turn auto-signal off: the retry must not depend on a new submission
    h.state.lock().unwrap().auto_signal = false;
    assert!(h.draw(&mut []).is_ok());
    assert_eq!(h.pacer.frame_number(), 1);
}

#[test]
fn test_suboptimal_acquire_still_draws() {
    let mut h = Harness::new(2);
    h.swapchain.acquire_script.push_back(SurfaceStatus::Suboptimal);
    h.swapchain.present_script.push_back(SurfaceStatus::Suboptimal);
    assert!(h.draw(&mut []).is_ok());
    assert_eq!(h.pacer.frame_number(), 1);
}

#[test]
fn test_out_of_date_present_counts_the_frame() {
    let mut h = Harness::new(2);
    h.swapchain.present_script.push_back(SurfaceStatus::OutOfDate);

    assert_eq!(h.draw(&mut []), Err(Error::SwapchainOutOfDate));
    assert_eq!(h.pacer.frame_number(), 1);
    assert_eq!(h.pacer.current_slot_index(), 1);
}

// ============================================================================
// Fatal failures
// ============================================================================

#[test]
fn test_fence_timeout_is_fatal() {
    let mut h = Harness::new(1);
    h.state.lock().unwrap().auto_signal = false;

    // First use: the fence was created signaled
    h.draw(&mut []).unwrap();

    let err = h.draw(&mut []).unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert!(!err.is_recoverable());
    assert_eq!(h.pacer.frame_number(), 1);
    // Nothing was flushed or acquired after the timeout
    assert_eq!(h.state.lock().unwrap().count("acquire("), 1);
}

#[test]
fn test_acquire_timeout_is_fatal() {
    let mut h = Harness::new(2);
    h.swapchain.acquire_times_out = true;
    let err = h.draw(&mut []).unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(h.pacer.frame_number(), 0);
}

#[test]
fn test_submit_failure_is_fatal_and_not_counted() {
    let mut h = Harness::new(2);
    h.state.lock().unwrap().fail_submit = true;
    let err = h.draw(&mut []).unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(h.pacer.frame_number(), 0);
    assert_eq!(h.state.lock().unwrap().count("present("), 0);
}

#[test]
fn test_pass_failure_aborts_the_frame() {
    let mut h = Harness::new(2);
    let mut passes: Vec<Box<dyn DrawPass>> = vec![Box::new(FailingPass)];
    let err = h.draw(&mut passes).unwrap_err();
    assert_eq!(err, Error::BackendError("pass failed".to_string()));
    assert_eq!(h.state.lock().unwrap().submit_count, 0);
}
