//! Error types for the Lumen engine
//!
//! This module defines the error types used throughout the engine:
//! construction failures, per-frame GPU failures, recoverable surface
//! conditions and descriptor pool exhaustion.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (fence wait, submit, present, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (handle, extent, configuration value, ...)
    InvalidResource(String),

    /// Initialization failed (engine, device, subsystems)
    InitializationFailed(String),

    /// A shader binary could not be read or is not valid SPIR-V
    ShaderLoadFailed(String),

    /// A bounded GPU wait (fence, image acquisition) ran out of time
    Timeout(String),

    /// The surface no longer matches the swapchain; it must be recreated
    SwapchainOutOfDate,

    /// Descriptor pool has no room left for the requested set
    PoolExhausted(String),

    /// Descriptor set used after the pool it came from was reset
    StaleDescriptorSet {
        /// Generation the set was allocated under
        set_generation: u64,
        /// Current generation of the pool
        pool_generation: u64,
    },
}

impl Error {
    /// Whether the error is a surface condition handled by swapchain recreation
    ///
    /// Every other error is fatal for the frame loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SwapchainOutOfDate)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderLoadFailed(msg) => write!(f, "Shader load failed: {}", msg),
            Error::Timeout(msg) => write!(f, "Timed out: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::PoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
            Error::StaleDescriptorSet { set_generation, pool_generation } => write!(
                f,
                "Stale descriptor set: allocated in generation {}, pool is at generation {}",
                set_generation, pool_generation
            ),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
