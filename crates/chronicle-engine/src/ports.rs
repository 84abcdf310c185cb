//! Ports the engine consumes: content generation and persistence.
//!
//! Both are async traits using return-position `impl Future` with `Send`
//! bounds, consumed through generics rather than trait objects (async
//! methods are not dyn-compatible; the generation adapter in the runner
//! uses enum dispatch internally for the same reason). Adapters map their
//! own error types into the port-level errors defined here.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronicle_types::{
    AnchorDraft, ArcId, BeatDraft, Character, Faction, Location, NarrativeArc, StoryBeat, World,
    WorldEvent, WorldId,
};

use crate::context::{AnchorContext, BeatContext, SummaryContext};

/// Errors from the generation port.
///
/// These are retried with bounded backoff inside the adapter; by the time
/// one reaches the engine, retries are exhausted and the operation fails
/// with no partial state persisted.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The backend call itself failed (HTTP error, timeout, bad status).
    #[error("generation backend failed: {0}")]
    Backend(String),

    /// The backend answered but the output was unparsable or the wrong
    /// shape (e.g. not exactly three anchors).
    #[error("generation output invalid: {0}")]
    InvalidOutput(String),

    /// All retry attempts failed.
    #[error("generation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The final attempt's error.
        last_error: String,
    },
}

/// Errors from the persistence port.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"world"` or `"arc"`.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// The operation conflicts with existing state.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// The storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Content generation consumed by the arc lifecycle controller.
pub trait GenerationPort: Send + Sync {
    /// Produce the three anchor drafts for a new arc, at indices 0, 7,
    /// and 14. The controller validates the shape; fewer or more than
    /// three, or wrong indices, is an [`GenerationError::InvalidOutput`].
    fn generate_anchors(
        &self,
        ctx: &AnchorContext,
    ) -> impl Future<Output = Result<Vec<AnchorDraft>, GenerationError>> + Send;

    /// Produce the next dynamic beat from accumulated world context.
    fn generate_beat(
        &self,
        ctx: &BeatContext,
    ) -> impl Future<Output = Result<BeatDraft, GenerationError>> + Send;

    /// Summarize a finished arc from its full beat list.
    fn summarize_arc(
        &self,
        ctx: &SummaryContext,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Persistence consumed by the arc lifecycle controller.
///
/// Implementations must make two operations atomic: the anchor batch at
/// arc creation (arc, three anchors, world pointer -- all or nothing) and
/// a beat insert together with its current-pointer update.
pub trait NarrativeStore: Send + Sync {
    /// Fetch a world by ID.
    fn get_world(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<World, StoreError>> + Send;

    /// The next `arc_number` for a world (monotonically increasing).
    fn next_arc_number(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Persist a new arc together with its three anchors and set the
    /// world's `current_arc_id`, atomically. The arc arrives with
    /// `current_beat_id` already pointing at the index-0 anchor; anchors
    /// at 7 and 14 must not move it.
    fn create_arc_with_anchors(
        &self,
        arc: &NarrativeArc,
        anchors: &[StoryBeat],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch an arc by ID.
    fn get_arc(&self, arc_id: ArcId) -> impl Future<Output = Result<NarrativeArc, StoreError>> + Send;

    /// All beats of an arc, ordered by `beat_index`.
    fn get_arc_beats(
        &self,
        arc_id: ArcId,
    ) -> impl Future<Output = Result<Vec<StoryBeat>, StoreError>> + Send;

    /// Persist one beat; when `move_pointer` is set, update the owning
    /// arc's `current_beat_id` to this beat in the same transaction.
    fn create_beat(
        &self,
        beat: &StoryBeat,
        move_pointer: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append a world event.
    fn create_event(
        &self,
        event: &WorldEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Recent world events, newest last, optionally restricted to those
    /// created after `since`, capped at `limit`.
    fn get_events_since(
        &self,
        world_id: WorldId,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<WorldEvent>, StoreError>> + Send;

    /// Mark an arc completed with its summary and timestamp, and clear
    /// the owning world's `current_arc_id`, atomically.
    fn complete_arc(
        &self,
        arc_id: ArcId,
        summary: &str,
        completed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Read-only faction snapshots for generation context.
    fn list_factions(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Faction>, StoreError>> + Send;

    /// Read-only character snapshots for generation context.
    fn list_characters(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Character>, StoreError>> + Send;

    /// Read-only location snapshots for generation context.
    fn list_locations(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Location>, StoreError>> + Send;
}

// Shared-ownership delegation so one port instance can serve both the
// lifecycle controller and the aggregator.

impl<P: GenerationPort> GenerationPort for Arc<P> {
    fn generate_anchors(
        &self,
        ctx: &AnchorContext,
    ) -> impl Future<Output = Result<Vec<AnchorDraft>, GenerationError>> + Send {
        (**self).generate_anchors(ctx)
    }

    fn generate_beat(
        &self,
        ctx: &BeatContext,
    ) -> impl Future<Output = Result<BeatDraft, GenerationError>> + Send {
        (**self).generate_beat(ctx)
    }

    fn summarize_arc(
        &self,
        ctx: &SummaryContext,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        (**self).summarize_arc(ctx)
    }
}

impl<P: NarrativeStore> NarrativeStore for Arc<P> {
    fn get_world(&self, world_id: WorldId) -> impl Future<Output = Result<World, StoreError>> + Send {
        (**self).get_world(world_id)
    }

    fn next_arc_number(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send {
        (**self).next_arc_number(world_id)
    }

    fn create_arc_with_anchors(
        &self,
        arc: &NarrativeArc,
        anchors: &[StoryBeat],
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).create_arc_with_anchors(arc, anchors)
    }

    fn get_arc(&self, arc_id: ArcId) -> impl Future<Output = Result<NarrativeArc, StoreError>> + Send {
        (**self).get_arc(arc_id)
    }

    fn get_arc_beats(
        &self,
        arc_id: ArcId,
    ) -> impl Future<Output = Result<Vec<StoryBeat>, StoreError>> + Send {
        (**self).get_arc_beats(arc_id)
    }

    fn create_beat(
        &self,
        beat: &StoryBeat,
        move_pointer: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).create_beat(beat, move_pointer)
    }

    fn create_event(&self, event: &WorldEvent) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).create_event(event)
    }

    fn get_events_since(
        &self,
        world_id: WorldId,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<WorldEvent>, StoreError>> + Send {
        (**self).get_events_since(world_id, since, limit)
    }

    fn complete_arc(
        &self,
        arc_id: ArcId,
        summary: &str,
        completed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).complete_arc(arc_id, summary, completed_at)
    }

    fn list_factions(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Faction>, StoreError>> + Send {
        (**self).list_factions(world_id)
    }

    fn list_characters(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Character>, StoreError>> + Send {
        (**self).list_characters(world_id)
    }

    fn list_locations(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Location>, StoreError>> + Send {
        (**self).list_locations(world_id)
    }
}
