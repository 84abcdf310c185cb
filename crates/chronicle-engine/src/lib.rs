//! Arc lifecycle, beat allocation, and event aggregation for the Chronicle
//! narrative engine.
//!
//! This crate owns narrative progression: every arc is 15 beat slots with
//! anchors fixed at indices 0, 7, and 14, and dynamic beats filling the
//! gaps as world events accumulate.
//!
//! # Modules
//!
//! - [`allocator`] -- Pure beat-slot math: next free index, next anchor,
//!   current-pointer rule.
//! - [`aggregator`] -- Per-world event buffering with threshold- and
//!   timer-driven flushing into beat generation.
//! - [`config`] -- Configuration loading from `chronicle-config.yaml` into
//!   strongly-typed structs.
//! - [`context`] -- Read-only context assembly for generation calls.
//! - [`lifecycle`] -- The arc state machine: create, progress, complete.
//! - [`ports`] -- [`GenerationPort`] and [`NarrativeStore`], the traits
//!   adapters implement.
//! - [`stub`] -- Deterministic port implementations for tests and offline
//!   runs.
//!
//! [`GenerationPort`]: ports::GenerationPort
//! [`NarrativeStore`]: ports::NarrativeStore

pub mod aggregator;
pub mod allocator;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod stub;

pub use aggregator::EventAggregator;
pub use error::EngineError;
pub use lifecycle::ArcLifecycle;
pub use ports::{GenerationError, GenerationPort, NarrativeStore, StoreError};
