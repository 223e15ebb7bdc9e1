//! Unit tests for the validation message filters and counters
//!
//! No GPU required: the callback inputs are plain Vulkan flag values.

use super::*;

fn config(severity: DebugSeverity) -> Config {
    Config {
        severity,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        enable_stats: true,
    }
}

#[test]
fn test_severity_flags_grow_with_level() {
    assert_eq!(
        severity_flags(DebugSeverity::ErrorsOnly),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    );
    assert!(severity_flags(DebugSeverity::ErrorsAndWarnings)
        .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(severity_flags(DebugSeverity::All)
        .contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

#[test]
fn test_errors_only_hides_warnings() {
    let cfg = config(DebugSeverity::ErrorsOnly);
    let validation = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;

    assert!(should_display(&cfg, vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, validation));
    assert!(!should_display(&cfg, vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, validation));
}

#[test]
fn test_category_filter() {
    let mut cfg = config(DebugSeverity::All);
    cfg.message_filter.show_performance = false;

    assert!(!should_display(
        &cfg,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
    ));
    assert!(should_display(
        &cfg,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
    ));
}

#[test]
fn test_message_level_from_vk() {
    assert_eq!(
        MessageLevel::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
        MessageLevel::Error
    );
    assert_eq!(
        MessageLevel::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::INFO),
        MessageLevel::Info
    );
    assert_eq!(
        MessageLevel::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
        MessageLevel::Verbose
    );
}

#[test]
fn test_stats_tracker_counts_and_resets() {
    let tracker = ValidationStatsTracker::new();
    tracker.increment(MessageLevel::Error);
    tracker.increment(MessageLevel::Warning);
    tracker.increment(MessageLevel::Warning);

    let stats = tracker.snapshot();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 2);
    assert_eq!(stats.total(), 3);
    assert!(stats.has_errors());

    tracker.reset();
    assert_eq!(tracker.snapshot(), ValidationStats::default());
}
