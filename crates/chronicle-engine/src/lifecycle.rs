//! The arc lifecycle controller.
//!
//! State machine over `{no-active-arc, active, completed}`:
//!
//! - **Create**: request three anchor drafts (indices 0/7/14), validate the
//!   batch, persist arc + anchors + world pointer atomically. Nothing is
//!   persisted until all three anchors exist as one validated batch.
//! - **Progress**: compute the next open index, assemble generation context
//!   (previous beats, next anchor, recent events, entity snapshots), make
//!   one generation call, persist the dynamic beat (pointer always moves),
//!   record a system event, publish `beat.created` at hop 0.
//! - **Complete**: summarize once, persist status/summary/timestamp, clear
//!   the world pointer, record a major completion event, publish
//!   `arc.completed`. Completing an already-completed arc is a no-op.
//!
//! Generation failures abort the operation with no partial state persisted;
//! retries happen inside the generation adapter, not here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use chronicle_bus::EventBus;
use chronicle_types::{
    AnchorDraft, ArcCompleted, ArcId, ArcStatus, BeatCreated, BeatId, BeatType, EventCategory,
    ImpactLevel, NarrativeArc, StoryBeat, TopicPayload, WorldEvent, WorldEventId,
    WorldEventLogged, WorldId,
};

use crate::allocator::{self, ANCHOR_INDICES, BEATS_PER_ARC};
use crate::context::{self, AnchorContext, BeatContext, SummaryContext, WorldSnapshots};
use crate::error::EngineError;
use crate::ports::{GenerationError, GenerationPort, NarrativeStore, StoreError};

/// Default cap on recent events pulled into a beat's generation context.
pub const DEFAULT_RECENT_EVENT_LIMIT: usize = 50;

/// Orchestrates arc creation, progression, and completion.
///
/// Holds its generation and store ports by value (generic, not boxed) and
/// the shared process-wide bus by reference count.
pub struct ArcLifecycle<G, S> {
    generation: G,
    store: S,
    bus: Arc<EventBus>,
    recent_event_limit: usize,
}

impl<G, S> ArcLifecycle<G, S>
where
    G: GenerationPort,
    S: NarrativeStore,
{
    /// Create a controller with the default recent-event limit.
    pub const fn new(generation: G, store: S, bus: Arc<EventBus>) -> Self {
        Self {
            generation,
            store,
            bus,
            recent_event_limit: DEFAULT_RECENT_EVENT_LIMIT,
        }
    }

    /// Override the cap on recent events in generation context.
    #[must_use]
    pub const fn with_recent_event_limit(mut self, limit: usize) -> Self {
        self.recent_event_limit = limit;
        self
    }

    /// Create a new arc for a world that has no active arc.
    ///
    /// Requests the three anchor drafts in one generation call, validates
    /// the batch shape, and persists arc + anchors + world pointer in one
    /// store transaction. Only the index-0 anchor becomes the current
    /// beat; anchors at 7 and 14 must not move the pointer.
    ///
    /// # Errors
    ///
    /// Fails with a consistency violation if the world already has an
    /// active arc, or a generation failure (nothing persisted) if the
    /// anchor batch is missing or malformed.
    pub async fn create_arc(&self, world_id: WorldId) -> Result<NarrativeArc, EngineError> {
        let world = self.store.get_world(world_id).await?;
        if let Some(existing) = world.current_arc_id {
            return Err(EngineError::Consistency(format!(
                "world {world_id} already has active arc {existing}"
            )));
        }

        let arc_number = self.store.next_arc_number(world_id).await?;
        let ctx = AnchorContext {
            world: world.clone(),
            arc_number,
            snapshots: self.snapshots(world_id).await?,
        };

        let drafts = self.generation.generate_anchors(&ctx).await?;
        validate_anchor_batch(&drafts)?;

        let arc_id = ArcId::new();
        let now = Utc::now();
        let mut anchors: Vec<StoryBeat> = drafts
            .into_iter()
            .map(|draft| StoryBeat {
                id: BeatId::new(),
                arc_id,
                beat_index: draft.beat_index,
                beat_type: BeatType::Anchor,
                name: draft.name,
                description: draft.description,
                directives: draft.directives,
                emergent: draft.storylines,
                created_at: now,
            })
            .collect();
        anchors.sort_by_key(|beat| beat.beat_index);

        let opening_beat_id = anchors
            .iter()
            .find(|beat| beat.beat_index == 0)
            .map(|beat| beat.id);

        let arc = NarrativeArc {
            id: arc_id,
            world_id,
            arc_number,
            status: ArcStatus::Active,
            current_beat_id: opening_beat_id,
            summary: None,
            created_at: now,
            completed_at: None,
        };

        self.store.create_arc_with_anchors(&arc, &anchors).await?;

        info!(
            world_id = %world_id,
            arc_id = %arc.id,
            arc_number,
            "arc created with anchor beats at 0, 7, 14"
        );

        Ok(arc)
    }

    /// Generate the next beat for a world from accumulated events.
    ///
    /// Creates an arc first if none is active. Routes to completion and
    /// returns `None` (no beat produced) if the arc already has all 15
    /// beats. On success the new dynamic beat is persisted (moving the
    /// current-beat pointer), a system event documents it, and
    /// `beat.created` is published as a root event at hop 0. Filling the
    /// fifteenth slot completes the arc in the same call.
    ///
    /// # Errors
    ///
    /// Generation failure propagates with no partial beat persisted.
    pub async fn generate_next_beat(
        &self,
        world_id: WorldId,
        trigger_events: &[WorldEventLogged],
    ) -> Result<Option<StoryBeat>, EngineError> {
        let mut world = self.store.get_world(world_id).await?;
        let arc = if let Some(arc_id) = world.current_arc_id {
            self.store.get_arc(arc_id).await?
        } else {
            info!(world_id = %world_id, "progression requested with no active arc, creating one");
            let arc = self.create_arc(world_id).await?;
            // Reload so the generation context sees the new pointer.
            world = self.store.get_world(world_id).await?;
            arc
        };

        let beats = self.store.get_arc_beats(arc.id).await?;
        if beats.len() >= usize::from(BEATS_PER_ARC) {
            debug!(arc_id = %arc.id, "arc already full, routing to completion");
            self.complete_arc(arc.id).await?;
            return Ok(None);
        }

        let next_index = allocator::next_beat_index(&beats)?;
        let next_anchor = allocator::next_anchor(&beats, next_index)?.clone();
        let previous_beats: Vec<StoryBeat> = beats
            .iter()
            .filter(|beat| beat.beat_index < next_index)
            .cloned()
            .collect();

        let since = beats.iter().map(|beat| beat.created_at).max();
        let events = self
            .store
            .get_events_since(world_id, since, self.recent_event_limit)
            .await?;
        let recent_events: Vec<String> = events.iter().map(context::format_event_line).collect();

        debug!(
            world_id = %world_id,
            arc_id = %arc.id,
            next_index,
            trigger_events = trigger_events.len(),
            context_events = recent_events.len(),
            "assembling beat generation context"
        );

        let ctx = BeatContext {
            world,
            arc: arc.clone(),
            next_index,
            previous_beats,
            next_anchor,
            recent_events,
            snapshots: self.snapshots(world_id).await?,
        };

        let draft = self.generation.generate_beat(&ctx).await?;

        let beat = StoryBeat {
            id: BeatId::new(),
            arc_id: arc.id,
            beat_index: next_index,
            beat_type: BeatType::Dynamic,
            name: draft.name,
            description: draft.description,
            directives: draft.directives,
            emergent: draft.emergent,
            created_at: Utc::now(),
        };

        self.store
            .create_beat(
                &beat,
                allocator::moves_current_pointer(BeatType::Dynamic, next_index),
            )
            .await?;

        let system_event = WorldEvent {
            id: WorldEventId::new(),
            world_id,
            arc_id: Some(arc.id),
            beat_id: Some(beat.id),
            impact: ImpactLevel::Moderate,
            category: EventCategory::SystemEvent,
            description: format!("Story beat {} \"{}\" began.", beat.beat_index, beat.name),
            created_at: Utc::now(),
        };
        self.store.create_event(&system_event).await?;

        // Root event, not a reaction: hop 0.
        self.bus
            .publish(
                TopicPayload::BeatCreated(BeatCreated {
                    world_id,
                    arc_id: arc.id,
                    beat_id: beat.id,
                    beat_index: beat.beat_index,
                    directives: beat.directives.clone(),
                    emergent: beat.emergent.clone(),
                }),
                0,
            )
            .await?;

        info!(
            world_id = %world_id,
            arc_id = %arc.id,
            beat_id = %beat.id,
            beat_index = beat.beat_index,
            name = %beat.name,
            "dynamic beat created"
        );

        if beats.len().saturating_add(1) >= usize::from(BEATS_PER_ARC) {
            info!(arc_id = %arc.id, "final beat slot filled, completing arc");
            self.complete_arc(arc.id).await?;
        }

        Ok(Some(beat))
    }

    /// Complete an arc: summarize once, persist the terminal state, clear
    /// the world's pointer, record a major completion event, and publish
    /// `arc.completed`.
    ///
    /// Completing an already-completed arc is a no-op -- the summarization
    /// port is never called twice for one arc.
    pub async fn complete_arc(&self, arc_id: ArcId) -> Result<(), EngineError> {
        let arc = self.store.get_arc(arc_id).await?;
        if !arc.is_active() {
            warn!(arc_id = %arc_id, "arc already completed, skipping");
            return Ok(());
        }

        let world = self.store.get_world(arc.world_id).await?;
        let beats = self.store.get_arc_beats(arc_id).await?;

        let ctx = SummaryContext {
            world,
            arc: arc.clone(),
            beats,
        };
        let summary = self.generation.summarize_arc(&ctx).await?;

        let completed_at = Utc::now();
        self.store
            .complete_arc(arc_id, &summary, completed_at)
            .await?;

        let completion_event = WorldEvent {
            id: WorldEventId::new(),
            world_id: arc.world_id,
            arc_id: Some(arc_id),
            beat_id: arc.current_beat_id,
            impact: ImpactLevel::Major,
            category: EventCategory::SystemEvent,
            description: format!("Arc {} concluded.", arc.arc_number),
            created_at: completed_at,
        };
        self.store.create_event(&completion_event).await?;

        self.bus
            .publish(
                TopicPayload::ArcCompleted(ArcCompleted {
                    world_id: arc.world_id,
                    arc_id,
                    summary,
                }),
                0,
            )
            .await?;

        info!(
            world_id = %arc.world_id,
            arc_id = %arc_id,
            arc_number = arc.arc_number,
            "arc completed"
        );

        Ok(())
    }

    /// Record a world event: persist it stamped with the currently active
    /// arc and beat, then publish `world.event.logged` as a root event.
    ///
    /// This is the entry point for player and system actions; reactive
    /// modules append to their own history logs instead.
    pub async fn record_event(
        &self,
        world_id: WorldId,
        impact: ImpactLevel,
        category: EventCategory,
        description: &str,
    ) -> Result<WorldEvent, EngineError> {
        let world = self.store.get_world(world_id).await?;
        let (arc_id, beat_id) = match world.current_arc_id {
            Some(arc_id) => {
                let arc = self.store.get_arc(arc_id).await?;
                (Some(arc_id), arc.current_beat_id)
            }
            None => (None, None),
        };

        let event = WorldEvent {
            id: WorldEventId::new(),
            world_id,
            arc_id,
            beat_id,
            impact,
            category,
            description: description.to_owned(),
            created_at: Utc::now(),
        };
        self.store.create_event(&event).await?;

        self.bus
            .publish(
                TopicPayload::WorldEventLogged(WorldEventLogged {
                    world_id,
                    event_id: event.id,
                    impact,
                    description: event.description.clone(),
                }),
                0,
            )
            .await?;

        debug!(
            world_id = %world_id,
            event_id = %event.id,
            impact = %impact,
            "world event recorded"
        );

        Ok(event)
    }

    /// Gather read-only entity snapshots for generation context.
    async fn snapshots(&self, world_id: WorldId) -> Result<WorldSnapshots, StoreError> {
        Ok(WorldSnapshots {
            factions: self.store.list_factions(world_id).await?,
            characters: self.store.list_characters(world_id).await?,
            locations: self.store.list_locations(world_id).await?,
        })
    }
}

/// Validate the shape of an anchor batch: exactly three drafts, one at
/// each of indices 0, 7, and 14.
fn validate_anchor_batch(drafts: &[AnchorDraft]) -> Result<(), GenerationError> {
    if drafts.len() != ANCHOR_INDICES.len() {
        return Err(GenerationError::InvalidOutput(format!(
            "expected exactly {} anchors, got {}",
            ANCHOR_INDICES.len(),
            drafts.len()
        )));
    }
    let mut indices: Vec<u8> = drafts.iter().map(|draft| draft.beat_index).collect();
    indices.sort_unstable();
    if indices != ANCHOR_INDICES {
        return Err(GenerationError::InvalidOutput(format!(
            "anchor indices must be exactly {ANCHOR_INDICES:?}, got {indices:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::Topic;

    use super::*;
    use crate::stub::{MemoryStore, StubGeneration};

    fn make_lifecycle() -> (
        ArcLifecycle<Arc<StubGeneration>, Arc<MemoryStore>>,
        Arc<StubGeneration>,
        Arc<MemoryStore>,
        Arc<EventBus>,
        WorldId,
    ) {
        let generation = Arc::new(StubGeneration::new());
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::default());
        let world_id = store.seed_world("Aldmere");
        let lifecycle = ArcLifecycle::new(
            Arc::clone(&generation),
            Arc::clone(&store),
            Arc::clone(&bus),
        );
        (lifecycle, generation, store, bus, world_id)
    }

    #[tokio::test]
    async fn create_arc_persists_three_anchors_with_opening_pointer() {
        let (lifecycle, _, store, _, world_id) = make_lifecycle();

        let arc = lifecycle.create_arc(world_id).await.unwrap();

        let beats = store.get_arc_beats(arc.id).await.unwrap();
        assert_eq!(beats.len(), 3);
        let indices: Vec<u8> = beats.iter().map(|b| b.beat_index).collect();
        assert_eq!(indices, vec![0, 7, 14]);
        assert!(beats.iter().all(|b| b.beat_type == BeatType::Anchor));

        let opening = beats.iter().find(|b| b.beat_index == 0).unwrap();
        let stored = store.get_arc(arc.id).await.unwrap();
        assert_eq!(stored.current_beat_id, Some(opening.id));

        let world = store.get_world(world_id).await.unwrap();
        assert_eq!(world.current_arc_id, Some(arc.id));
    }

    #[tokio::test]
    async fn create_arc_rejected_when_arc_active() {
        let (lifecycle, _, _, _, world_id) = make_lifecycle();
        lifecycle.create_arc(world_id).await.unwrap();

        let result = lifecycle.create_arc(world_id).await;
        assert!(matches!(result, Err(EngineError::Consistency(_))));
    }

    #[tokio::test]
    async fn failed_anchor_generation_persists_nothing() {
        let (lifecycle, generation, store, _, world_id) = make_lifecycle();
        generation.set_failing(true);

        let result = lifecycle.create_arc(world_id).await;
        assert!(matches!(result, Err(EngineError::Generation { .. })));

        let world = store.get_world(world_id).await.unwrap();
        assert_eq!(world.current_arc_id, None);
        assert_eq!(store.arc_count(), 0);
    }

    #[tokio::test]
    async fn wrong_anchor_shape_is_generation_failure() {
        let drafts = vec![AnchorDraft {
            beat_index: 0,
            name: String::from("Only one"),
            description: String::new(),
            directives: Vec::new(),
            storylines: Vec::new(),
        }];
        assert!(validate_anchor_batch(&drafts).is_err());

        let bad_indices: Vec<AnchorDraft> = [0_u8, 7, 13]
            .iter()
            .map(|index| AnchorDraft {
                beat_index: *index,
                name: String::from("x"),
                description: String::new(),
                directives: Vec::new(),
                storylines: Vec::new(),
            })
            .collect();
        assert!(validate_anchor_batch(&bad_indices).is_err());
    }

    #[tokio::test]
    async fn first_dynamic_beat_lands_at_index_one_and_publishes() {
        let (lifecycle, _, store, bus, world_id) = make_lifecycle();
        lifecycle.create_arc(world_id).await.unwrap();

        let published = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        bus.subscribe(Topic::BeatCreated, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                if let TopicPayload::BeatCreated(payload) = envelope.payload {
                    sink.lock().unwrap().push((payload.beat_index, envelope.hop_count));
                }
                Ok(())
            }
        });

        let beat = lifecycle
            .generate_next_beat(world_id, &[])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(beat.beat_index, 1);
        assert_eq!(beat.beat_type, BeatType::Dynamic);

        let arc_id = store.get_world(world_id).await.unwrap().current_arc_id.unwrap();
        let stored = store.get_arc(arc_id).await.unwrap();
        assert_eq!(stored.current_beat_id, Some(beat.id));

        assert_eq!(*published.lock().unwrap(), vec![(1, 0)]);
    }

    #[tokio::test]
    async fn progression_creates_arc_when_none_active() {
        let (lifecycle, _, store, _, world_id) = make_lifecycle();

        let beat = lifecycle
            .generate_next_beat(world_id, &[])
            .await
            .unwrap()
            .unwrap();

        // Arc was created on demand: three anchors plus the new dynamic beat.
        assert_eq!(beat.beat_index, 1);
        let arc_id = store.get_world(world_id).await.unwrap().current_arc_id.unwrap();
        assert_eq!(store.get_arc_beats(arc_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn failed_beat_generation_persists_nothing() {
        let (lifecycle, generation, store, _, world_id) = make_lifecycle();
        let arc = lifecycle.create_arc(world_id).await.unwrap();

        generation.set_failing(true);
        let result = lifecycle.generate_next_beat(world_id, &[]).await;
        assert!(matches!(result, Err(EngineError::Generation { .. })));
        assert_eq!(store.get_arc_beats(arc.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn completing_twice_summarizes_once() {
        let (lifecycle, generation, store, _, world_id) = make_lifecycle();
        let arc = lifecycle.create_arc(world_id).await.unwrap();

        // Fill all dynamic slots; the final insert auto-completes the arc.
        for _ in 0..12 {
            lifecycle.generate_next_beat(world_id, &[]).await.unwrap();
        }

        let stored = store.get_arc(arc.id).await.unwrap();
        assert_eq!(stored.status, ArcStatus::Completed);
        assert!(stored.summary.is_some());
        assert_eq!(generation.summary_calls(), 1);

        // Explicit second completion is a no-op.
        lifecycle.complete_arc(arc.id).await.unwrap();
        assert_eq!(generation.summary_calls(), 1);

        let world = store.get_world(world_id).await.unwrap();
        assert_eq!(world.current_arc_id, None);
    }

    #[tokio::test]
    async fn record_event_stamps_active_arc_and_beat() {
        let (lifecycle, _, _, _, world_id) = make_lifecycle();
        let arc = lifecycle.create_arc(world_id).await.unwrap();

        let event = lifecycle
            .record_event(
                world_id,
                ImpactLevel::Major,
                EventCategory::PlayerAction,
                "The garrison mutinied.",
            )
            .await
            .unwrap();

        assert_eq!(event.arc_id, Some(arc.id));
        assert_eq!(event.beat_id, arc.current_beat_id);
    }
}
