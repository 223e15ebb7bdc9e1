//! End-to-end tests: the frame engine driving the Vulkan backend
//!
//! Each test binary gets its own process, so this file can create its own
//! window and device next to the shared one of the device tests. winit allows
//! one event loop per process: keep a single test in this binary.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_engine_tests -- --ignored


use gpu_test_utils::{create_test_window, test_config};
use lumen_engine::lumen::render::{Extent2D, Swapchain};
use lumen_engine::lumen::{BackgroundConfig, Engine, EngineConfig};
use lumen_engine_renderer_vulkan::lumen::VulkanGraphicsDevice;
use serial_test::serial;

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_engine_draws_flash_frames() {
    let (window, _event_loop) = create_test_window();
    let mut device = VulkanGraphicsDevice::new(&window, test_config(&window)).unwrap();
    let swapchain = device.create_swapchain().unwrap();
    // The surface now belongs to the swapchain
    assert!(device.create_swapchain().is_err());
    assert!(swapchain.image_count() >= 2);
    assert!(!swapchain.extent().is_empty());

    let config = EngineConfig {
        background: BackgroundConfig::Flash,
        draw_extent: Some(Extent2D::new(320, 240)),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(Box::new(device), Box::new(swapchain), config).unwrap();

    for _ in 0..10 {
        match engine.draw_frame() {
            Ok(()) => {}
            // Hidden windows may report a stale surface on some platforms
            Err(e) if e.is_recoverable() => {
                let size = window.inner_size();
                engine
                    .recreate_swapchain(Extent2D::new(size.width, size.height))
                    .unwrap();
            }
            Err(e) => panic!("frame failed: {}", e),
        }
    }

    assert!(engine.frame_number() > 0);
    assert_eq!(engine.draw_target().extent, Extent2D::new(320, 240));

    engine.cleanup();
    assert_eq!(engine.frame_pacer().slot(0).map(|s| s.pending_releases()), Some(0));
}
