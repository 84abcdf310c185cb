//! The transient envelope wrapped around every published payload.

use chrono::{DateTime, Utc};

use chronicle_types::{Topic, TopicPayload};

/// Default hop ceiling. A reactive cascade deeper than this is treated as
/// an accidental cycle.
pub const DEFAULT_MAX_HOPS: u8 = 10;

/// Default serialized payload ceiling in bytes (32 KiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 32 * 1024;

/// Tunable guard ceilings for the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusLimits {
    /// A publish with `hop_count >= max_hops` is rejected before dispatch.
    pub max_hops: u8,
    /// A publish whose serialized payload exceeds this many bytes is
    /// rejected before dispatch.
    pub max_payload_bytes: usize,
}

impl Default for BusLimits {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// The envelope delivered to each subscribed handler.
///
/// Envelopes are transient: they exist only for the duration of a publish
/// cycle and are never persisted. The hop count records how many times
/// handlers have republished in direct reaction to receiving an event;
/// handlers that republish must pass `hop_count + 1` to their own publish.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The topic this payload was published under.
    pub topic: Topic,
    /// The typed payload.
    pub payload: TopicPayload,
    /// When the publish happened.
    pub timestamp: DateTime<Utc>,
    /// Number of reactive re-publications leading to this event. Zero for
    /// root events.
    pub hop_count: u8,
}

impl Envelope {
    /// The hop count a handler must use when republishing in direct
    /// reaction to this envelope.
    pub const fn next_hop(&self) -> u8 {
        self.hop_count.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = BusLimits::default();
        assert_eq!(limits.max_hops, 10);
        assert_eq!(limits.max_payload_bytes, 32 * 1024);
    }

    #[test]
    fn next_hop_increments() {
        let envelope = Envelope {
            topic: Topic::BeatCreated,
            payload: TopicPayload::ArcCompleted(chronicle_types::ArcCompleted {
                world_id: chronicle_types::WorldId::new(),
                arc_id: chronicle_types::ArcId::new(),
                summary: String::new(),
            }),
            timestamp: Utc::now(),
            hop_count: 3,
        };
        assert_eq!(envelope.next_hop(), 4);
    }
}
