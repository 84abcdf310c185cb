//! Error taxonomy for the progression engine.
//!
//! Three failure families with different handling:
//!
//! - **Guard violations** (hop limit, payload size) -- fatal, never
//!   retried; they signal a cascade bug.
//! - **Generation failures** -- already retried with backoff at the
//!   adapter boundary; reaching the engine means retries are exhausted and
//!   the operation aborts with nothing persisted.
//! - **Consistency violations** (arc/world/anchor missing) -- fatal for
//!   the operation, logged with full context.

use chronicle_bus::BusError;

use crate::allocator::AllocatorError;
use crate::ports::{GenerationError, StoreError};

/// Errors surfaced by lifecycle and aggregator operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A bus guard rejected a publish.
    #[error("guard violation: {source}")]
    Guard {
        /// The underlying bus error.
        #[from]
        source: BusError,
    },

    /// The generation port failed after exhausting its retries.
    #[error("generation failure: {source}")]
    Generation {
        /// The underlying generation error.
        #[from]
        source: GenerationError,
    },

    /// Beat allocation found inconsistent data.
    #[error("allocation failure: {source}")]
    Allocation {
        /// The underlying allocator error.
        #[from]
        source: AllocatorError,
    },

    /// A persistence operation failed.
    #[error("store failure: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// World state contradicts an engine invariant.
    #[error("consistency violation: {0}")]
    Consistency(String),
}
