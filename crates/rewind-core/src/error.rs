//! Error types for rewind-core

use crate::Tick;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The unset sentinel was used where a real tick is required
    #[error("tick is unset")]
    UnsetTick,

    /// A tick subtraction would go below zero
    #[error("cannot step {by} ticks back from {tick}")]
    TickUnderflow { tick: Tick, by: u64 },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
