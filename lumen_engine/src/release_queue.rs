//! Deferred release of GPU objects
//!
//! Objects are queued in acquisition order and released in reverse order,
//! so dependents always go before what they depend on. The engine keeps one
//! global queue for engine-lifetime objects and one per frame slot for
//! objects that only have to outlive that slot's GPU work.

use std::fmt;
use crate::graphics_device::{GraphicsDevice, GpuResource};

/// One deferred release
pub enum ReleaseAction {
    /// Device-owned object destroyed through `GraphicsDevice::destroy_resource`
    Resource(GpuResource),
    /// Arbitrary release logic
    Callback(Box<dyn FnOnce(&mut dyn GraphicsDevice)>),
}

impl ReleaseAction {
    /// Wrap a closure as a release action
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn GraphicsDevice) + 'static,
    {
        ReleaseAction::Callback(Box::new(f))
    }

    fn run(self, device: &mut dyn GraphicsDevice) {
        match self {
            ReleaseAction::Resource(resource) => device.destroy_resource(resource),
            ReleaseAction::Callback(f) => f(device),
        }
    }
}

impl From<GpuResource> for ReleaseAction {
    fn from(resource: GpuResource) -> Self {
        ReleaseAction::Resource(resource)
    }
}

impl fmt::Debug for ReleaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseAction::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            ReleaseAction::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// LIFO queue of release actions
#[derive(Debug, Default)]
pub struct DeferredReleaseQueue {
    actions: Vec<ReleaseAction>,
}

impl DeferredReleaseQueue {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    /// Append an action; it runs before everything already queued
    pub fn push(&mut self, action: impl Into<ReleaseAction>) {
        self.actions.push(action.into());
    }

    /// Run every queued action, most recent first, and leave the queue empty
    ///
    /// Actions must not push into the queue being flushed; the queue is
    /// drained up front, so anything pushed meanwhile waits for the next flush.
    pub fn flush(&mut self, device: &mut dyn GraphicsDevice) {
        if self.actions.is_empty() {
            return;
        }
        let actions = std::mem::take(&mut self.actions);
        for action in actions.into_iter().rev() {
            action.run(device);
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
#[path = "release_queue_tests.rs"]
mod tests;
