//! In-process publish/subscribe bus for the Chronicle narrative engine.
//!
//! The bus decouples publishers from subscribers inside one process. It is
//! purely a trigger mechanism: delivery is synchronous within the publishing
//! call, nothing is persisted or replayed, and the durable record of what
//! happened in a world is the world-event log, not the bus.
//!
//! Two guards bound reactive cascades before any handler runs:
//!
//! - **Hop guard**: a publish whose hop count meets the ceiling is rejected,
//!   turning accidental handler cycles into a loud failure instead of an
//!   infinite loop.
//! - **Payload size guard**: a publish whose serialized payload exceeds the
//!   ceiling is rejected, bounding memory blow-up from pathological generated
//!   text being re-broadcast.

pub mod bus;
pub mod envelope;
pub mod error;

pub use bus::{EventBus, SubscriptionId};
pub use envelope::{BusLimits, Envelope};
pub use error::BusError;
