//! Unit tests for image_transitions.rs

use crate::image_transitions::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::*;

const IMAGE: ImageHandle = ImageHandle(7);

#[test]
fn test_barrier_is_all_commands_both_ways() {
    let barrier = image_barrier(IMAGE, ImageLayout::Undefined, ImageLayout::General);
    assert_eq!(barrier.src_stage, PipelineStages::ALL_COMMANDS);
    assert_eq!(barrier.dst_stage, PipelineStages::ALL_COMMANDS);
    assert_eq!(barrier.src_access, AccessFlags::MEMORY_WRITE);
    assert_eq!(barrier.dst_access, AccessFlags::MEMORY_WRITE | AccessFlags::MEMORY_READ);
    assert_eq!(barrier.old_layout, ImageLayout::Undefined);
    assert_eq!(barrier.new_layout, ImageLayout::General);
    assert_eq!(barrier.image, IMAGE);
}

#[test]
fn test_barrier_aspect_follows_target_layout() {
    let depth = image_barrier(IMAGE, ImageLayout::Undefined, ImageLayout::DepthAttachmentOptimal);
    assert_eq!(depth.aspect, ImageAspect::DEPTH);

    for to in [
        ImageLayout::General,
        ImageLayout::TransferSrcOptimal,
        ImageLayout::TransferDstOptimal,
        ImageLayout::PresentSrc,
        ImageLayout::ColorAttachmentOptimal,
    ] {
        assert_eq!(image_barrier(IMAGE, ImageLayout::Undefined, to).aspect, ImageAspect::COLOR);
    }

    // Leaving a depth layout for a color one is judged by the destination
    let out = image_barrier(IMAGE, ImageLayout::DepthAttachmentOptimal, ImageLayout::General);
    assert_eq!(out.aspect, ImageAspect::COLOR);
}

#[test]
fn test_blit_with_different_extents_is_scaled() {
    let blit = blit_region(
        ImageHandle(1),
        ImageHandle(2),
        Extent2D::new(800, 600),
        Extent2D::new(1024, 768),
    );
    assert!(blit.is_scaled());
    assert_eq!(blit.filter, Filter::Linear);
    assert_eq!(blit.aspect, ImageAspect::COLOR);
}

#[test]
fn test_blit_with_equal_extents_is_one_to_one() {
    let extent = Extent2D::new(1280, 720);
    let blit = blit_region(ImageHandle(1), ImageHandle(2), extent, extent);
    assert!(!blit.is_scaled());
    assert_eq!(blit.src_extent, blit.dst_extent);
}

#[test]
fn test_transition_and_copy_record_on_device() {
    let mut device = MockGraphicsDevice::new();
    let state = device.state();
    let cmd = device.create_command_context().unwrap();

    transition(&mut device, cmd, IMAGE, ImageLayout::General, ImageLayout::TransferSrcOptimal);
    copy_scaled(
        &mut device,
        cmd,
        IMAGE,
        ImageHandle(8),
        Extent2D::new(800, 600),
        Extent2D::new(1024, 768),
    );

    let state = state.lock().unwrap();
    let tail: Vec<&String> = state.events.iter().skip(1).collect();
    assert_eq!(tail.len(), 2);
    assert_eq!(
        tail[0],
        &format!("barrier({}, image=7, General->TransferSrcOptimal)", cmd.0)
    );
    assert_eq!(tail[1], &format!("blit({}, 7->8, 800x600->1024x768, Linear)", cmd.0));
}
