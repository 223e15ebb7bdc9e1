/// Vulkan device configuration

use lumen_engine::lumen::render::Extent2D;

/// Validation message severity shown by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose messages
    All,
}

/// Validation message categories shown by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Per-severity count of validation messages seen since device creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Presentation mode preference
///
/// Falls back to `Fifo` (always supported) when the surface lacks the
/// requested mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Vsync, queue of pending images
    Fifo,
    /// Vsync, tears when a frame is late
    FifoRelaxed,
    /// Vsync, newest image replaces the pending one
    Mailbox,
    /// No vsync
    Immediate,
}

/// Vulkan device creation parameters
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Application name reported to the driver
    pub app_name: String,

    /// Enable the Khronos validation layer and debug messenger
    ///
    /// Ignored when the crate is built without the `vulkan-validation` feature.
    pub enable_validation: bool,

    /// Minimum severity the messenger reports
    pub debug_severity: DebugSeverity,

    /// Message categories the messenger reports
    pub message_filter: DebugMessageFilter,

    /// Abort the process on the first validation error (debugger attachment)
    pub break_on_validation_error: bool,

    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,

    /// Preferred presentation mode
    pub present_mode: PresentMode,

    /// Swapchain extent used when the surface does not dictate one
    pub initial_extent: Extent2D,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "Lumen Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            enable_validation_stats: true,
            present_mode: PresentMode::Fifo,
            initial_extent: Extent2D::new(1700, 900),
        }
    }
}
