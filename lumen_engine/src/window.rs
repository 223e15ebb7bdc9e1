//! Window event source consumed by the run loop

use crate::graphics_device::Extent2D;

/// Window state after processing pending events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    /// The user asked to close the window
    pub quit: bool,
    /// The window is minimized; nothing should be drawn
    pub minimized: bool,
    /// Current drawable size in pixels
    pub extent: Extent2D,
}

/// Source of window events, polled once per loop iteration
pub trait WindowEvents {
    /// Process pending events and report the resulting state
    fn poll(&mut self) -> WindowState;
}
