//! Deterministic port implementations for tests and offline runs.
//!
//! [`StubGeneration`] produces canned drafts without any network call and
//! counts invocations so tests can assert call discipline (one summary per
//! arc, no generation on failed flushes). [`MemoryStore`] is a mutex-guarded
//! in-memory [`NarrativeStore`] honoring the same atomicity contract as the
//! Postgres implementation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use chronicle_types::{
    AnchorDraft, ArcId, ArcStatus, BeatDraft, Character, Faction, Location, NarrativeArc,
    StoryBeat, World, WorldEvent, WorldId,
};

use crate::allocator::ANCHOR_INDICES;
use crate::context::{AnchorContext, BeatContext, SummaryContext};
use crate::ports::{GenerationError, GenerationPort, NarrativeStore, StoreError};

/// A generation source that returns canned, deterministic drafts.
#[derive(Debug, Default)]
pub struct StubGeneration {
    failing: AtomicBool,
    anchor_calls: AtomicU32,
    beat_calls: AtomicU32,
    summary_calls: AtomicU32,
}

impl StubGeneration {
    /// Create a stub that succeeds until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle forced failure for every subsequent call.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many anchor batches have been requested.
    pub fn anchor_calls(&self) -> u32 {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    /// How many beats have been requested.
    pub fn beat_calls(&self) -> u32 {
        self.beat_calls.load(Ordering::SeqCst)
    }

    /// How many summaries have been requested.
    pub fn summary_calls(&self) -> u32 {
        self.summary_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), GenerationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Backend(String::from(
                "stub generation forced failure",
            )));
        }
        Ok(())
    }
}

impl GenerationPort for StubGeneration {
    async fn generate_anchors(
        &self,
        ctx: &AnchorContext,
    ) -> Result<Vec<AnchorDraft>, GenerationError> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(ANCHOR_INDICES
            .iter()
            .map(|index| AnchorDraft {
                beat_index: *index,
                name: format!("Anchor {index} of arc {}", ctx.arc_number),
                description: format!(
                    "A fixed waypoint in the story of {} at position {index}.",
                    ctx.world.name
                ),
                directives: vec![String::from("Hold the story to this waypoint.")],
                storylines: Vec::new(),
            })
            .collect())
    }

    async fn generate_beat(&self, ctx: &BeatContext) -> Result<BeatDraft, GenerationError> {
        self.beat_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(BeatDraft {
            name: format!("Beat {}", ctx.next_index),
            description: format!(
                "The story moves toward \"{}\" carrying {} recent events.",
                ctx.next_anchor.name,
                ctx.recent_events.len()
            ),
            directives: vec![String::from("Advance the current storyline.")],
            emergent: Vec::new(),
        })
    }

    async fn summarize_arc(&self, ctx: &SummaryContext) -> Result<String, GenerationError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(format!(
            "Arc {} of {} ran its course over {} beats.",
            ctx.arc.arc_number,
            ctx.world.name,
            ctx.beats.len()
        ))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    worlds: Vec<World>,
    arcs: Vec<NarrativeArc>,
    beats: Vec<StoryBeat>,
    events: Vec<WorldEvent>,
    factions: Vec<Faction>,
    characters: Vec<Character>,
    locations: Vec<Location>,
}

/// In-memory [`NarrativeStore`] behind one mutex.
///
/// Each trait method takes and releases the lock within a single critical
/// section, so the multi-row operations (anchor batch, beat plus pointer,
/// completion plus pointer clear) are atomic the same way the database
/// transactions are.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a world with no active arc and return its ID.
    pub fn seed_world(&self, name: &str) -> WorldId {
        let world = World {
            id: WorldId::new(),
            name: name.to_owned(),
            current_arc_id: None,
            created_at: Utc::now(),
        };
        let id = world.id;
        if let Ok(mut state) = self.state.lock() {
            state.worlds.push(world);
        }
        id
    }

    /// Insert a faction snapshot.
    pub fn seed_faction(&self, faction: Faction) {
        if let Ok(mut state) = self.state.lock() {
            state.factions.push(faction);
        }
    }

    /// How many arcs exist across all worlds.
    pub fn arc_count(&self) -> usize {
        self.state.lock().map(|state| state.arcs.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend(String::from("memory store lock poisoned")))
    }
}

impl NarrativeStore for MemoryStore {
    async fn get_world(&self, world_id: WorldId) -> Result<World, StoreError> {
        let state = self.lock()?;
        state
            .worlds
            .iter()
            .find(|world| world.id == world_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "world",
                id: world_id.to_string(),
            })
    }

    async fn next_arc_number(&self, world_id: WorldId) -> Result<u32, StoreError> {
        let state = self.lock()?;
        let count = state
            .arcs
            .iter()
            .filter(|arc| arc.world_id == world_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX).saturating_add(1))
    }

    async fn create_arc_with_anchors(
        &self,
        arc: &NarrativeArc,
        anchors: &[StoryBeat],
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let Some(world) = state.worlds.iter_mut().find(|world| world.id == arc.world_id) else {
            return Err(StoreError::NotFound {
                entity: "world",
                id: arc.world_id.to_string(),
            });
        };
        if world.current_arc_id.is_some() {
            return Err(StoreError::Conflict(format!(
                "world {} already has an active arc",
                arc.world_id
            )));
        }
        world.current_arc_id = Some(arc.id);
        state.arcs.push(arc.clone());
        state.beats.extend_from_slice(anchors);
        Ok(())
    }

    async fn get_arc(&self, arc_id: ArcId) -> Result<NarrativeArc, StoreError> {
        let state = self.lock()?;
        state
            .arcs
            .iter()
            .find(|arc| arc.id == arc_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "arc",
                id: arc_id.to_string(),
            })
    }

    async fn get_arc_beats(&self, arc_id: ArcId) -> Result<Vec<StoryBeat>, StoreError> {
        let state = self.lock()?;
        let mut beats: Vec<StoryBeat> = state
            .beats
            .iter()
            .filter(|beat| beat.arc_id == arc_id)
            .cloned()
            .collect();
        beats.sort_by_key(|beat| beat.beat_index);
        Ok(beats)
    }

    async fn create_beat(&self, beat: &StoryBeat, move_pointer: bool) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.arcs.iter().any(|arc| arc.id == beat.arc_id) {
            return Err(StoreError::NotFound {
                entity: "arc",
                id: beat.arc_id.to_string(),
            });
        }
        if state
            .beats
            .iter()
            .any(|existing| existing.arc_id == beat.arc_id && existing.beat_index == beat.beat_index)
        {
            return Err(StoreError::Conflict(format!(
                "arc {} already has a beat at index {}",
                beat.arc_id, beat.beat_index
            )));
        }
        state.beats.push(beat.clone());
        if move_pointer {
            if let Some(arc) = state.arcs.iter_mut().find(|arc| arc.id == beat.arc_id) {
                arc.current_beat_id = Some(beat.id);
            }
        }
        Ok(())
    }

    async fn create_event(&self, event: &WorldEvent) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.events.push(event.clone());
        Ok(())
    }

    async fn get_events_since(
        &self,
        world_id: WorldId,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<WorldEvent>, StoreError> {
        let state = self.lock()?;
        let mut events: Vec<WorldEvent> = state
            .events
            .iter()
            .filter(|event| {
                event.world_id == world_id && since.is_none_or(|cutoff| event.created_at > cutoff)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.created_at);
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }

    async fn complete_arc(
        &self,
        arc_id: ArcId,
        summary: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let world_id = {
            let Some(arc) = state.arcs.iter_mut().find(|arc| arc.id == arc_id) else {
                return Err(StoreError::NotFound {
                    entity: "arc",
                    id: arc_id.to_string(),
                });
            };
            arc.status = ArcStatus::Completed;
            arc.summary = Some(summary.to_owned());
            arc.completed_at = Some(completed_at);
            arc.world_id
        };
        if let Some(world) = state.worlds.iter_mut().find(|world| world.id == world_id) {
            if world.current_arc_id == Some(arc_id) {
                world.current_arc_id = None;
            }
        }
        Ok(())
    }

    async fn list_factions(&self, world_id: WorldId) -> Result<Vec<Faction>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .factions
            .iter()
            .filter(|faction| faction.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn list_characters(&self, world_id: WorldId) -> Result<Vec<Character>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .characters
            .iter()
            .filter(|character| character.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn list_locations(&self, world_id: WorldId) -> Result<Vec<Location>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .locations
            .iter()
            .filter(|location| location.world_id == world_id)
            .cloned()
            .collect())
    }
}
