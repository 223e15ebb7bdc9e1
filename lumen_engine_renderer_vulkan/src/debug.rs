/// Vulkan Debug Messenger - Routes validation layer messages into the engine log
///
/// Messages are filtered by severity and category, counted per severity and
/// grouped by text so repeated messages show an occurrence count.

use ash::vk;
use colored::*;
use lumen_engine::{engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::vulkan_config::{DebugMessageFilter, DebugSeverity, ValidationStats};

const SOURCE: &str = "lumen::vulkan::validation";

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

/// Global validation statistics
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Global message tracker for grouping identical messages
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Debug configuration for the callback
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub severity: DebugSeverity,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub enable_stats: bool,
}

/// Per-severity message counters, indexed by `MessageLevel`
struct ValidationStatsTracker {
    counts: [AtomicU32; 4],
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            counts: [const { AtomicU32::new(0) }; 4],
        }
    }

    fn increment(&self, level: MessageLevel) {
        self.counts[level as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        let count = |level: MessageLevel| self.counts[level as usize].load(Ordering::Relaxed);
        ValidationStats {
            errors: count(MessageLevel::Error),
            warnings: count(MessageLevel::Warning),
            info: count(MessageLevel::Info),
            verbose: count(MessageLevel::Verbose),
        }
    }

    fn reset(&self) {
        for counter in &self.counts {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Severity of a single validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Verbose = 3,
}

impl MessageLevel {
    pub(crate) fn from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            MessageLevel::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            MessageLevel::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            MessageLevel::Info
        } else {
            MessageLevel::Verbose
        }
    }
}

/// Severity flags the messenger subscribes to
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Whether a message passes the configured severity and category filters
pub(crate) fn should_display(
    config: &Config,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> bool {
    if !severity_flags(config.severity).intersects(severity) {
        return false;
    }

    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        config.message_filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        config.message_filter.show_performance
    } else {
        config.message_filter.show_general
    }
}

fn type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Count one more occurrence of `message`, returning the new count
fn track_message(message: &str) -> u32 {
    let mut guard = MESSAGE_TRACKER.lock().unwrap_or_else(|e| e.into_inner());
    let count = guard
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Initialize debug configuration
pub fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    *MESSAGE_TRACKER.lock().unwrap_or_else(|e| e.into_inner()) = Some(FxHashMap::default());
    *DEBUG_CONFIG.lock().unwrap_or_else(|e| e.into_inner()) = Some(config);
}

/// Drop the configuration so late callbacks during teardown are ignored
pub fn cleanup_debug_config() {
    *DEBUG_CONFIG.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Counters accumulated since the device was created
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Print the validation counters to stdout, with the number of messages
/// that were reported more than once
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("{}", "Vulkan validation: no messages".green().bold());
        return;
    }

    let rows = [
        ("errors", stats.errors, Color::Red),
        ("warnings", stats.warnings, Color::Yellow),
        ("info", stats.info, Color::Cyan),
        ("verbose", stats.verbose, Color::BrightBlack),
    ];

    println!("{}", "Vulkan validation summary".bright_blue().bold());
    for (label, count, color) in rows.into_iter().filter(|(_, count, _)| *count > 0) {
        println!("  {:<9} {}", label.color(color), count);
    }
    println!("  {:<9} {}", "total".bold(), stats.total());

    let repeated = MESSAGE_TRACKER
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .map_or(0, |messages| messages.values().filter(|&&count| count > 1).count());
    if repeated > 0 {
        println!("  {} distinct message(s) repeated", repeated);
    }
}

/// Vulkan debug messenger callback
///
/// Called by the validation layers, possibly from driver threads.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let config = match *DEBUG_CONFIG.lock().unwrap_or_else(|e| e.into_inner()) {
        Some(cfg) => cfg,
        None => return vk::FALSE,
    };

    if !should_display(&config, message_severity, message_type) {
        return vk::FALSE;
    }

    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    let level = MessageLevel::from_vk(message_severity);
    let occurrence_count = if config.enable_stats {
        VALIDATION_STATS.increment(level);
        track_message(&message)
    } else {
        1
    };

    let repeat = if occurrence_count > 1 {
        format!(" [x{}]", occurrence_count)
    } else {
        String::new()
    };
    let kind = type_name(message_type);

    match level {
        MessageLevel::Error => {
            engine_error!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id_name, message)
        }
        MessageLevel::Warning => {
            engine_warn!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id_name, message)
        }
        MessageLevel::Info => {
            engine_info!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id_name, message)
        }
        MessageLevel::Verbose => {
            engine_trace!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id_name, message)
        }
    }

    if config.break_on_error && level == MessageLevel::Error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n",
            "BREAK ON VALIDATION ERROR - Aborting execution".red().bold(),
            message_id_name.yellow(),
            kind.cyan(),
        );
        std::process::abort();
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
