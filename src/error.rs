//! Error handling for the plinth collections
//!
//! Contract violations (out of range indices, cursor misuse) are programming
//! errors and panic via debug-friendly assertions. Everything that can fail at
//! runtime in a well-formed program is allocation, and surfaces here.

use thiserror::Error;

/// Main error type for the plinth collections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlinthError {
    /// Memory allocation failures
    #[error("Memory allocation failed: requested {size} bytes")]
    OutOfMemory {
        /// Number of bytes requested
        size: usize,
    },

    /// A pooled container outgrew its 32-bit index space
    #[error("Capacity exceeded: container limited to {limit} elements")]
    CapacityExceeded {
        /// Maximum number of addressable elements
        limit: usize,
    },
}

impl PlinthError {
    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create a capacity exceeded error
    pub fn capacity_exceeded(limit: usize) -> Self {
        Self::CapacityExceeded { limit }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::OutOfMemory { .. } => true,
            Self::CapacityExceeded { .. } => false,
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "memory",
            Self::CapacityExceeded { .. } => "capacity",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PlinthError>;
