/// Lumen Engine - owner of the device, the frame loop and every engine-lifetime resource
///
/// Only one `Engine` may exist at a time. It is created with a graphics
/// device and a swapchain, builds the frame slots, the draw target, the
/// descriptor pool and the background pass, and tears all of them down
/// again in reverse order once the device is idle.
///
/// The pluggable logger also lives here, as process-wide state behind the
/// `engine_*!` macros.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::config::{BackgroundConfig, EngineConfig};
use crate::descriptor::{DescriptorSet, DescriptorSetLayout, ResourcePool};
use crate::error::{Error, Result};
use crate::frame::{DrawPass, FramePacer};
use crate::graphics_device::{
    DrawTarget, DrawTargetDesc, Extent2D, GraphicsDevice, GpuResource, ImageUsage, Swapchain,
};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::passes::{FlashPass, GradientPass};
use crate::release_queue::{DeferredReleaseQueue, ReleaseAction};
use crate::window::WindowEvents;

// ===== INTERNAL STATE =====

/// Set while an `Engine` exists
static ENGINE_ALIVE: AtomicBool = AtomicBool::new(false);

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Lowest severity that reaches the logger
static LOG_FLOOR: AtomicU8 = AtomicU8::new(LogSeverity::default_floor() as u8);

fn severity_from_u8(value: u8) -> LogSeverity {
    match value {
        0 => LogSeverity::Trace,
        1 => LogSeverity::Debug,
        2 => LogSeverity::Info,
        3 => LogSeverity::Warn,
        _ => LogSeverity::Error,
    }
}

/// Engine-lifetime objects built during initialization
struct Subsystems {
    pacer: FramePacer,
    draw_target: DrawTarget,
    pool: ResourcePool,
    passes: Vec<Box<dyn DrawPass>>,
}

// ===== PUBLIC API =====

/// Frame engine
///
/// # Example
///
/// ```no_run
/// use lumen_engine::lumen::{Engine, EngineConfig, WindowEvents};
/// # fn backend() -> (Box<dyn lumen_engine::lumen::render::GraphicsDevice>, Box<dyn lumen_engine::lumen::render::Swapchain>) { unimplemented!() }
/// # fn events() -> Box<dyn WindowEvents> { unimplemented!() }
///
/// let (device, swapchain) = backend();
/// let mut engine = Engine::new(device, swapchain, EngineConfig::default())?;
/// engine.run(events().as_mut())?;
/// engine.cleanup();
/// # Ok::<(), lumen_engine::lumen::Error>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    passes: Vec<Box<dyn DrawPass>>,
    pacer: FramePacer,
    pool: ResourcePool,
    draw_target: DrawTarget,
    /// Engine-lifetime releases, flushed last at cleanup
    global_releases: DeferredReleaseQueue,
    // The swapchain goes before the device it was created from
    swapchain: Box<dyn Swapchain>,
    device: Box<dyn GraphicsDevice>,
    cleaned_up: bool,
}

impl Engine {
    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("lumen::Engine", "Initialization failed: {}", msg);
            }
            Error::ShaderLoadFailed(msg) => {
                crate::engine_error!("lumen::Engine", "Shader load failed: {}", msg);
            }
            _ => {
                crate::engine_error!("lumen::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    /// Initialize the engine
    ///
    /// Creates the frame slots, the draw target, the descriptor pool and the
    /// configured background pass. Everything created is released again if
    /// a later step fails.
    ///
    /// # Errors
    ///
    /// - `InitializationFailed` if another engine exists or the
    ///   configuration is invalid
    /// - `ShaderLoadFailed` if the background shader cannot be loaded
    /// - any device error raised while creating resources
    pub fn new(
        mut device: Box<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate().map_err(Self::log_and_return_error)?;

        if ENGINE_ALIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "An engine instance already exists".to_string(),
            )));
        }

        let mut global_releases = DeferredReleaseQueue::new();
        let subsystems = match Self::init_subsystems(
            device.as_mut(),
            swapchain.as_ref(),
            &config,
            &mut global_releases,
        ) {
            Ok(subsystems) => subsystems,
            Err(err) => {
                global_releases.flush(device.as_mut());
                ENGINE_ALIVE.store(false, Ordering::Release);
                return Err(Self::log_and_return_error(err));
            }
        };

        crate::engine_info!(
            "lumen::Engine",
            "Engine initialized: {} frames in flight, draw target {}x{} {:?}, swapchain {}x{} ({} images)",
            subsystems.pacer.slot_count(),
            subsystems.draw_target.extent.width,
            subsystems.draw_target.extent.height,
            subsystems.draw_target.format,
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count()
        );

        Ok(Self {
            config,
            passes: subsystems.passes,
            pacer: subsystems.pacer,
            pool: subsystems.pool,
            draw_target: subsystems.draw_target,
            global_releases,
            swapchain,
            device,
            cleaned_up: false,
        })
    }

    fn init_subsystems(
        device: &mut dyn GraphicsDevice,
        swapchain: &dyn Swapchain,
        config: &EngineConfig,
        global: &mut DeferredReleaseQueue,
    ) -> Result<Subsystems> {
        let pacer = FramePacer::new(
            device,
            config.frames_in_flight,
            config.fence_timeout,
            config.acquire_timeout,
            global,
        )?;

        let extent = config.draw_extent.unwrap_or_else(|| swapchain.extent());
        if extent.is_empty() {
            return Err(Error::InitializationFailed(format!(
                "Draw target extent {}x{} is empty",
                extent.width, extent.height
            )));
        }
        let draw_target = device.create_draw_target(&DrawTargetDesc {
            format: config.draw_format,
            extent,
            usage: ImageUsage::TRANSFER_SRC
                | ImageUsage::TRANSFER_DST
                | ImageUsage::STORAGE
                | ImageUsage::COLOR_ATTACHMENT,
        })?;
        global.push(GpuResource::DrawTarget(draw_target));

        let mut pool = ResourcePool::initialize(
            device,
            config.descriptor_pool.max_sets,
            &config.descriptor_pool.ratios,
        )?;
        global.push(GpuResource::DescriptorPool(pool.handle()));

        let mut passes: Vec<Box<dyn DrawPass>> = Vec::new();
        match &config.background {
            BackgroundConfig::Gradient { shader_path } => {
                let pass = GradientPass::new(device, &mut pool, &draw_target, shader_path, global)?;
                passes.push(Box::new(pass));
            }
            BackgroundConfig::Flash => passes.push(Box::new(FlashPass)),
            BackgroundConfig::None => {}
        }

        Ok(Subsystems { pacer, draw_target, pool, passes })
    }

    /// Whether an engine currently exists in this process
    pub fn is_alive() -> bool {
        ENGINE_ALIVE.load(Ordering::Acquire)
    }

    /// Main loop: poll window events and draw until the window asks to quit
    ///
    /// While minimized (or without area) nothing is drawn; the loop sleeps
    /// `minimized_poll_interval` between polls. An out-of-date swapchain is
    /// recreated at the window's current extent. Any other error ends the
    /// loop.
    pub fn run(&mut self, events: &mut dyn WindowEvents) -> Result<()> {
        loop {
            let state = events.poll();
            if state.quit {
                crate::engine_info!(
                    "lumen::Engine",
                    "Quit requested after {} frames",
                    self.frame_number()
                );
                return Ok(());
            }

            // A window without area cannot be drawn to nor recreated at
            if state.minimized || state.extent.is_empty() {
                std::thread::sleep(self.config.minimized_poll_interval);
                continue;
            }

            match self.draw_frame() {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => self.recreate_swapchain(state.extent)?,
                Err(err) => return Err(err),
            }
        }
    }

    /// Record, submit and present one frame
    pub fn draw_frame(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.pacer.draw_frame(
            self.device.as_mut(),
            self.swapchain.as_mut(),
            &self.draw_target,
            &mut self.passes,
        )
    }

    /// Rebuild the swapchain after it went out of date
    ///
    /// Skipped while the extent is empty; the next out-of-date frame retries.
    pub fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        if extent.is_empty() {
            crate::engine_debug!("lumen::Engine", "Swapchain recreation deferred: window has no area");
            return Ok(());
        }
        self.device.wait_idle()?;
        self.swapchain.recreate(extent)?;
        crate::engine_debug!(
            "lumen::Engine",
            "Swapchain recreated at {}x{}",
            extent.width,
            extent.height
        );
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.cleaned_up {
            return Err(Error::InvalidResource("Engine has been cleaned up".to_string()));
        }
        Ok(())
    }

    /// Append a draw pass; passes run in registration order every frame
    ///
    /// # Errors
    ///
    /// `InvalidResource` after `cleanup`.
    pub fn add_draw_pass(&mut self, pass: Box<dyn DrawPass>) -> Result<()> {
        self.ensure_running()?;
        crate::engine_debug!("lumen::Engine", "Draw pass '{}' added", pass.name());
        self.passes.push(pass);
        Ok(())
    }

    /// Release something when the engine shuts down
    pub fn defer_release(&mut self, action: impl Into<ReleaseAction>) {
        self.global_releases.push(action);
    }

    /// Allocate a descriptor set from the engine pool
    ///
    /// # Errors
    ///
    /// `InvalidResource` after `cleanup`, `PoolExhausted` when the pool is full.
    pub fn allocate_descriptor_set(&mut self, layout: &DescriptorSetLayout) -> Result<DescriptorSet> {
        self.ensure_running()?;
        self.pool.allocate(self.device.as_mut(), layout)
    }

    /// Return every descriptor set to the engine pool
    ///
    /// Waits for the device first: frames in flight may still read the
    /// sets. Registered passes then allocate their sets again. Sets the
    /// caller allocated before the call must not be used afterwards.
    pub fn reset_descriptor_pool(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.device.wait_idle()?;
        self.pool.reset_all(self.device.as_mut())?;
        for pass in self.passes.iter_mut() {
            pass.descriptors_reset(self.device.as_mut(), &mut self.pool)?;
        }
        crate::engine_debug!(
            "lumen::Engine",
            "Descriptor pool reset to generation {}",
            self.pool.generation()
        );
        Ok(())
    }

    /// Shut down: wait for the device, then run every pending release
    ///
    /// Slot queues are flushed first, then the global queue, in reverse
    /// acquisition order. Calling it again does nothing; dropping the
    /// engine calls it.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        if let Err(err) = self.device.wait_idle() {
            crate::engine_error!("lumen::Engine", "Device idle wait failed during cleanup: {}", err);
        }
        self.pacer.flush_all(self.device.as_mut());
        self.global_releases.flush(self.device.as_mut());
        self.passes.clear();
        self.cleaned_up = true;
        crate::engine_info!(
            "lumen::Engine",
            "Engine cleaned up after {} frames",
            self.frame_number()
        );
    }

    /// Frames submitted so far
    pub fn frame_number(&self) -> u64 {
        self.pacer.frame_number()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn draw_target(&self) -> &DrawTarget {
        &self.draw_target
    }

    pub fn resource_pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn frame_pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// Device access for creating resources outside the engine
    pub fn device(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    // ===== LOGGING =====

    /// Set a custom logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lumen_engine::lumen::Engine;
    /// use lumen_engine::lumen::log::{Logger, LogEntry};
    ///
    /// struct FileLogger;
    ///
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Set the lowest severity that reaches the logger
    pub fn set_log_level(severity: LogSeverity) {
        LOG_FLOOR.store(severity as u8, Ordering::Relaxed);
    }

    /// Current lowest severity that reaches the logger
    pub fn log_level() -> LogSeverity {
        severity_from_u8(LOG_FLOOR.load(Ordering::Relaxed))
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if severity < Self::log_level() {
            return;
        }
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error!, engine_err! and engine_bail!.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if severity < Self::log_level() {
            return;
        }
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cleanup();
        ENGINE_ALIVE.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
