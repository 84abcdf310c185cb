//! Error types for the bus.
//!
//! Guard violations are always fatal and never retried: they signal a
//! programming bug (a runaway reactive cascade or an oversized payload),
//! not a transient condition.

/// Errors that can occur when publishing.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The payload's hop count met or exceeded the configured ceiling.
    #[error("hop limit exceeded: {hop_count} >= {max_hops} on topic {topic}")]
    HopLimitExceeded {
        /// The offending hop count.
        hop_count: u8,
        /// The configured ceiling.
        max_hops: u8,
        /// The topic the publish was attempted on.
        topic: &'static str,
    },

    /// The serialized payload exceeded the configured size ceiling.
    #[error("payload too large: {bytes} bytes > {max_bytes} on topic {topic}")]
    PayloadTooLarge {
        /// The serialized payload size.
        bytes: usize,
        /// The configured ceiling.
        max_bytes: usize,
        /// The topic the publish was attempted on.
        topic: &'static str,
    },

    /// The payload could not be serialized for the size check.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
