//! Lumen demo: a window cleared by the gradient (or flash) background
//!
//! Usage: lumen_demo [--flash] [--shader <path.spv>] [--frames-in-flight <n>]
//!
//! The gradient shader is compiled from `shaders/gradient.comp`:
//! `glslc shaders/gradient.comp -o shaders/gradient.comp.spv`

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use lumen_engine::lumen::render::Extent2D;
use lumen_engine::lumen::{
    BackgroundConfig, Engine, EngineConfig, Error, Result, WindowEvents, WindowState,
};
use lumen_engine::{engine_error, engine_info};
use lumen_engine_renderer_vulkan::lumen::{DeviceConfig, VulkanGraphicsDevice};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

const WINDOW_TITLE: &str = "Lumen";
const WINDOW_SIZE: (u32, u32) = (1700, 900);

// ============================================================================
// Window handling
// ============================================================================

/// winit application state, fed by `pump_app_events`
#[derive(Default)]
struct DemoApp {
    window: Option<Window>,
    quit: bool,
    error: Option<String>,
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_SIZE.0, WINDOW_SIZE.1));

        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                self.error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            self.quit = true;
            event_loop.exit();
        }
    }
}

/// Window event source handed to `Engine::run`
struct DemoWindow {
    event_loop: EventLoop<()>,
    app: DemoApp,
}

impl DemoWindow {
    /// Create the event loop and pump it until the window exists
    fn open() -> Result<Self> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::InitializationFailed(format!("Failed to create event loop: {}", e)))?;
        let mut demo = Self {
            event_loop,
            app: DemoApp::default(),
        };

        while demo.app.window.is_none() {
            let status = demo
                .event_loop
                .pump_app_events(Some(Duration::from_millis(16)), &mut demo.app);
            if let Some(err) = demo.app.error.take() {
                return Err(Error::InitializationFailed(format!(
                    "Failed to create window: {}",
                    err
                )));
            }
            if let PumpStatus::Exit(_) = status {
                return Err(Error::InitializationFailed(
                    "Event loop exited before the window was created".to_string(),
                ));
            }
        }

        Ok(demo)
    }

    fn window(&self) -> Result<&Window> {
        self.app
            .window
            .as_ref()
            .ok_or_else(|| Error::InitializationFailed("Window is not open".to_string()))
    }
}

impl WindowEvents for DemoWindow {
    fn poll(&mut self) -> WindowState {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(Some(Duration::ZERO), &mut self.app) {
            self.app.quit = true;
        }

        let Some(window) = self.app.window.as_ref() else {
            return WindowState {
                quit: true,
                ..WindowState::default()
            };
        };

        let size = window.inner_size();
        let extent = Extent2D::new(size.width, size.height);
        WindowState {
            quit: self.app.quit,
            minimized: extent.is_empty() || window.is_minimized() == Some(true),
            extent,
        }
    }
}

// ============================================================================
// Command line
// ============================================================================

fn engine_config_from_args() -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--flash" => config.background = BackgroundConfig::Flash,
            "--shader" => {
                let path = args.next().ok_or_else(|| {
                    Error::InitializationFailed("--shader expects a path".to_string())
                })?;
                config.background = BackgroundConfig::Gradient {
                    shader_path: PathBuf::from(path),
                };
            }
            "--frames-in-flight" => {
                config.frames_in_flight = args
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| {
                        Error::InitializationFailed(
                            "--frames-in-flight expects a positive integer".to_string(),
                        )
                    })?;
            }
            other => {
                return Err(Error::InitializationFailed(format!(
                    "Unknown argument: {}",
                    other
                )))
            }
        }
    }

    config.validate()?;
    Ok(config)
}

// ============================================================================
// Entry point
// ============================================================================

fn run() -> Result<()> {
    let config = engine_config_from_args()?;

    // Declared before the engine: the window must outlive the surface
    let mut window = DemoWindow::open()?;

    let size = window.window()?.inner_size();
    let device_config = DeviceConfig {
        app_name: WINDOW_TITLE.to_string(),
        initial_extent: Extent2D::new(size.width, size.height),
        ..DeviceConfig::default()
    };

    let mut device = VulkanGraphicsDevice::new(window.window()?, device_config)?;
    let swapchain = device.create_swapchain()?;
    let mut engine = Engine::new(Box::new(device), Box::new(swapchain), config)?;

    let result = engine.run(&mut window);
    engine_info!("lumen::demo", "Rendered {} frames", engine.frame_number());
    engine.cleanup();
    result
}

fn main() -> ExitCode {
    let result = run();

    lumen_engine_renderer_vulkan::lumen::print_validation_stats_report();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            engine_error!("lumen::demo", "{}", e);
            ExitCode::FAILURE
        }
    }
}
