//! Event aggregation and beat triggering.
//!
//! The aggregator subscribes to `world.event.logged` and buffers payloads
//! per world. A flush calls the lifecycle controller once the buffer holds
//! at least the configured number of severe (Major or Catastrophic) events;
//! flushes happen on arrival of a qualifying event and on a periodic timer,
//! and the timer applies the same severity bar -- it never generates from a
//! quiet buffer.
//!
//! Flush protocol per world: snapshot the buffer, mark the world in flight
//! so concurrent flushes are rejected, generate outside the lock, then on
//! success remove exactly the snapshotted prefix (events that arrived during
//! generation stay buffered for the next flush). On failure the buffer is
//! left untouched so the events trigger again later. The bus handler itself
//! never returns an error; failures surface through logs only.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::time::{Duration, interval};
use tracing::{debug, error, info, warn};

use chronicle_bus::{EventBus, SubscriptionId};
use chronicle_types::{Topic, TopicPayload, WorldEventLogged, WorldId};

use crate::lifecycle::ArcLifecycle;
use crate::ports::{GenerationPort, NarrativeStore};

/// Default number of severe events required to trigger a flush.
pub const DEFAULT_SEVERE_EVENT_THRESHOLD: usize = 3;

#[derive(Debug, Default)]
struct WorldBuffer {
    pending: Vec<WorldEventLogged>,
    in_flight: bool,
}

impl WorldBuffer {
    fn severe_count(&self) -> usize {
        self.pending
            .iter()
            .filter(|event| event.impact.is_severe())
            .count()
    }
}

/// Buffers world events and triggers beat generation through the
/// lifecycle controller.
pub struct EventAggregator<G, S> {
    lifecycle: Arc<ArcLifecycle<G, S>>,
    buffers: Mutex<BTreeMap<WorldId, WorldBuffer>>,
    severe_event_threshold: usize,
}

impl<G, S> EventAggregator<G, S>
where
    G: GenerationPort + 'static,
    S: NarrativeStore + 'static,
{
    /// Create an aggregator flushing through the given controller.
    pub const fn new(lifecycle: Arc<ArcLifecycle<G, S>>, severe_event_threshold: usize) -> Self {
        Self {
            lifecycle,
            buffers: Mutex::new(BTreeMap::new()),
            severe_event_threshold,
        }
    }

    /// Subscribe to `world.event.logged` on the given bus.
    ///
    /// The handler buffers the payload and attempts a flush; it always
    /// reports success to the bus, so aggregation problems never block
    /// delivery to sibling subscribers.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let aggregator = Arc::clone(self);
        bus.subscribe(Topic::WorldEventLogged, move |envelope| {
            let aggregator = Arc::clone(&aggregator);
            async move {
                if let TopicPayload::WorldEventLogged(payload) = envelope.payload {
                    let world_id = payload.world_id;
                    aggregator.on_event(payload);
                    aggregator.maybe_flush(world_id).await;
                }
                Ok(())
            }
        })
    }

    /// Buffer one event without flushing.
    pub fn on_event(&self, event: WorldEventLogged) {
        let Ok(mut buffers) = self.buffers.lock() else {
            error!(world_id = %event.world_id, "aggregator buffer lock poisoned, event dropped");
            return;
        };
        let buffer = buffers.entry(event.world_id).or_default();
        buffer.pending.push(event);
        debug!(
            pending = buffer.pending.len(),
            severe = buffer.severe_count(),
            "event buffered"
        );
    }

    /// Flush the world's buffer if it meets the severity bar and no flush
    /// is already in flight.
    pub async fn maybe_flush(&self, world_id: WorldId) {
        let Some(batch) = self.begin_flush(world_id) else {
            return;
        };
        self.finish_flush(world_id, batch).await;
    }

    /// Timer tick: attempt a flush for every buffered world. The severity
    /// bar still applies, so quiet worlds generate nothing.
    pub async fn flush_all(&self) {
        let world_ids: Vec<WorldId> = {
            let Ok(buffers) = self.buffers.lock() else {
                error!("aggregator buffer lock poisoned, timer flush skipped");
                return;
            };
            buffers.keys().copied().collect()
        };
        for world_id in world_ids {
            self.maybe_flush(world_id).await;
        }
    }

    /// Run the periodic flush loop. Never returns; spawn it as a task.
    pub async fn run_flush_timer(self: Arc<Self>, interval_secs: u64) {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
        // The first tick fires immediately; skip it so startup does not
        // race event delivery.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.flush_all().await;
        }
    }

    /// Number of buffered events for a world.
    pub fn pending_count(&self, world_id: WorldId) -> usize {
        self.buffers
            .lock()
            .map(|buffers| {
                buffers
                    .get(&world_id)
                    .map_or(0, |buffer| buffer.pending.len())
            })
            .unwrap_or(0)
    }

    /// Check the bar and claim the flush slot. Returns the batch snapshot
    /// when a flush should proceed.
    fn begin_flush(&self, world_id: WorldId) -> Option<Vec<WorldEventLogged>> {
        let Ok(mut buffers) = self.buffers.lock() else {
            error!(world_id = %world_id, "aggregator buffer lock poisoned, flush skipped");
            return None;
        };
        let buffer = buffers.get_mut(&world_id)?;
        if buffer.in_flight {
            debug!(world_id = %world_id, "flush already in flight, skipping");
            return None;
        }
        let severe = buffer.severe_count();
        if severe < self.severe_event_threshold {
            debug!(
                world_id = %world_id,
                severe,
                threshold = self.severe_event_threshold,
                "severity bar not met"
            );
            return None;
        }
        buffer.in_flight = true;
        Some(buffer.pending.clone())
    }

    /// Generate from the snapshotted batch and settle the buffer.
    async fn finish_flush(&self, world_id: WorldId, batch: Vec<WorldEventLogged>) {
        let result = self.lifecycle.generate_next_beat(world_id, &batch).await;

        let Ok(mut buffers) = self.buffers.lock() else {
            error!(world_id = %world_id, "aggregator buffer lock poisoned after flush");
            return;
        };
        let Some(buffer) = buffers.get_mut(&world_id) else {
            return;
        };
        buffer.in_flight = false;

        match result {
            Ok(beat) => {
                // Only the snapshotted prefix is consumed; events that
                // arrived during generation wait for the next flush.
                buffer.pending.drain(..batch.len().min(buffer.pending.len()));
                info!(
                    world_id = %world_id,
                    consumed = batch.len(),
                    remaining = buffer.pending.len(),
                    beat_created = beat.is_some(),
                    "flush complete"
                );
            }
            Err(e) => {
                warn!(
                    world_id = %world_id,
                    buffered = buffer.pending.len(),
                    error = %e,
                    "flush failed, buffer preserved for retry"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::{ImpactLevel, WorldEventId};

    use super::*;
    use crate::stub::{MemoryStore, StubGeneration};

    struct Fixture {
        aggregator: Arc<EventAggregator<Arc<StubGeneration>, Arc<MemoryStore>>>,
        generation: Arc<StubGeneration>,
        store: Arc<MemoryStore>,
        bus: Arc<EventBus>,
        world_id: WorldId,
    }

    async fn fixture() -> Fixture {
        let generation = Arc::new(StubGeneration::new());
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::default());
        let world_id = store.seed_world("Aldmere");
        let lifecycle = Arc::new(ArcLifecycle::new(
            Arc::clone(&generation),
            Arc::clone(&store),
            Arc::clone(&bus),
        ));
        lifecycle.create_arc(world_id).await.unwrap();
        let aggregator = Arc::new(EventAggregator::new(lifecycle, 3));
        Fixture {
            aggregator,
            generation,
            store,
            bus,
            world_id,
        }
    }

    fn severe(world_id: WorldId) -> WorldEventLogged {
        WorldEventLogged {
            world_id,
            event_id: WorldEventId::new(),
            impact: ImpactLevel::Major,
            description: String::from("The bridge fell."),
        }
    }

    fn mild(world_id: WorldId) -> WorldEventLogged {
        WorldEventLogged {
            world_id,
            event_id: WorldEventId::new(),
            impact: ImpactLevel::Minor,
            description: String::from("A quiet market day."),
        }
    }

    #[tokio::test]
    async fn below_threshold_generates_nothing() {
        let f = fixture().await;
        for _ in 0..2 {
            f.aggregator.on_event(severe(f.world_id));
            f.aggregator.maybe_flush(f.world_id).await;
        }
        assert_eq!(f.generation.beat_calls(), 0);
        assert_eq!(f.aggregator.pending_count(f.world_id), 2);
    }

    #[tokio::test]
    async fn mild_events_never_trigger() {
        let f = fixture().await;
        for _ in 0..10 {
            f.aggregator.on_event(mild(f.world_id));
            f.aggregator.maybe_flush(f.world_id).await;
        }
        f.aggregator.flush_all().await;
        assert_eq!(f.generation.beat_calls(), 0);
        assert_eq!(f.aggregator.pending_count(f.world_id), 10);
    }

    #[tokio::test]
    async fn third_severe_event_triggers_one_beat() {
        let f = fixture().await;
        f.aggregator.on_event(mild(f.world_id));
        for _ in 0..3 {
            f.aggregator.on_event(severe(f.world_id));
            f.aggregator.maybe_flush(f.world_id).await;
        }

        assert_eq!(f.generation.beat_calls(), 1);
        assert_eq!(f.aggregator.pending_count(f.world_id), 0);

        let arc_id = f
            .store
            .get_world(f.world_id)
            .await
            .unwrap()
            .current_arc_id
            .unwrap();
        let beats = f.store.get_arc_beats(arc_id).await.unwrap();
        assert_eq!(beats.len(), 4);
    }

    #[tokio::test]
    async fn failed_flush_preserves_buffer_for_retry() {
        let f = fixture().await;
        f.generation.set_failing(true);
        for _ in 0..3 {
            f.aggregator.on_event(severe(f.world_id));
        }
        f.aggregator.maybe_flush(f.world_id).await;

        assert_eq!(f.aggregator.pending_count(f.world_id), 3);

        f.generation.set_failing(false);
        f.aggregator.flush_all().await;
        assert_eq!(f.generation.beat_calls(), 2);
        assert_eq!(f.aggregator.pending_count(f.world_id), 0);
    }

    #[tokio::test]
    async fn attached_handler_buffers_and_flushes_from_bus() {
        let f = fixture().await;
        f.aggregator.attach(&f.bus);

        for _ in 0..3 {
            f.bus
                .publish(TopicPayload::WorldEventLogged(severe(f.world_id)), 0)
                .await
                .unwrap();
        }

        assert_eq!(f.generation.beat_calls(), 1);
        assert_eq!(f.aggregator.pending_count(f.world_id), 0);
    }

    #[tokio::test]
    async fn worlds_buffer_independently() {
        let f = fixture().await;
        let other_world = f.store.seed_world("Veyra");

        for _ in 0..2 {
            f.aggregator.on_event(severe(f.world_id));
        }
        for _ in 0..2 {
            f.aggregator.on_event(severe(other_world));
        }
        f.aggregator.flush_all().await;

        // Neither world alone meets the bar, even though four severe
        // events exist in total.
        assert_eq!(f.generation.beat_calls(), 0);
        assert_eq!(f.aggregator.pending_count(f.world_id), 2);
        assert_eq!(f.aggregator.pending_count(other_world), 2);
    }
}
