//! Core entity structs for the Chronicle narrative engine.
//!
//! Arcs, beats, and world events are owned by the progression engine.
//! Factions, characters, and locations are owned by their reactive modules;
//! the engine only ever reads them as snapshots for generation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    ArcStatus, BeatType, CharacterStatus, EventCategory, FactionStatus, ImpactLevel,
    LocationStatus,
};
use crate::ids::{ArcId, BeatId, CharacterId, FactionId, LocationId, WorldEventId, WorldId};

/// A simulated world. The progression engine only touches the pointer to
/// the currently active arc; everything else about a world lives in modules
/// outside this workspace's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Unique identifier.
    pub id: WorldId,
    /// Human-readable world name.
    pub name: String,
    /// The currently active arc, if any. At most one arc per world is
    /// active at any time.
    pub current_arc_id: Option<ArcId>,
    /// Real-world creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One complete 15-beat narrative cycle for a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeArc {
    /// Unique identifier.
    pub id: ArcId,
    /// The world this arc belongs to.
    pub world_id: WorldId,
    /// Monotonically increasing sequence number within the world.
    pub arc_number: u32,
    /// Lifecycle status.
    pub status: ArcStatus,
    /// The beat that is "currently happening". Only ever points to a beat
    /// belonging to this arc. Anchors at indices 7 and 14 never become
    /// current through insertion; only the index-0 anchor and dynamic
    /// beats move this pointer.
    pub current_beat_id: Option<BeatId>,
    /// Arc summary, written exactly once at completion.
    pub summary: Option<String>,
    /// Real-world creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Completion timestamp, set with the summary.
    pub completed_at: Option<DateTime<Utc>>,
}

impl NarrativeArc {
    /// Whether this arc is still accepting beats.
    pub const fn is_active(&self) -> bool {
        matches!(self.status, ArcStatus::Active)
    }
}

/// One story increment within an arc. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryBeat {
    /// Unique identifier.
    pub id: BeatId,
    /// The arc this beat belongs to.
    pub arc_id: ArcId,
    /// Position within the arc, 0 through 14.
    pub beat_index: u8,
    /// Anchor (pre-planned) or dynamic (generated on demand).
    pub beat_type: BeatType,
    /// Short beat title.
    pub name: String,
    /// Narrative description of what happens in this beat.
    pub description: String,
    /// Directives for downstream modules reacting to this beat.
    pub directives: Vec<String>,
    /// Emergent storylines this beat opens or advances.
    pub emergent: Vec<String>,
    /// Real-world creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A persisted record of something that happened in a world.
///
/// World events are append-only: any module may create them continuously,
/// and this engine never mutates or deletes them. Once an arc is active,
/// new events are stamped with the arc and with whichever beat was current
/// at record time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Unique identifier.
    pub id: WorldEventId,
    /// The world this event belongs to.
    pub world_id: WorldId,
    /// The active arc at record time, if any.
    pub arc_id: Option<ArcId>,
    /// The current beat at record time, if any.
    pub beat_id: Option<BeatId>,
    /// Narrative weight.
    pub impact: ImpactLevel,
    /// Which kind of actor produced the event.
    pub category: EventCategory,
    /// Free-text description of what happened.
    pub description: String,
    /// Real-world timestamp.
    pub created_at: DateTime<Utc>,
}

/// A faction snapshot as the engine sees it when assembling generation
/// context. Owned and mutated only by the faction module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    /// Unique identifier.
    pub id: FactionId,
    /// The world this faction belongs to.
    pub world_id: WorldId,
    /// Faction name.
    pub name: String,
    /// Political standing.
    pub status: FactionStatus,
    /// One-line description of the faction's agenda.
    pub agenda: String,
    /// Locations this faction currently holds.
    pub held_locations: Vec<LocationId>,
}

/// A character snapshot for generation context. Owned and mutated only by
/// the character module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Unique identifier.
    pub id: CharacterId,
    /// The world this character belongs to.
    pub world_id: WorldId,
    /// Character name.
    pub name: String,
    /// Narrative state.
    pub status: CharacterStatus,
    /// The faction this character is aligned with, if any.
    pub faction_id: Option<FactionId>,
    /// Where the character currently is, if known.
    pub location_id: Option<LocationId>,
}

/// A location snapshot for generation context. Owned and mutated only by
/// the location module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Unique identifier.
    pub id: LocationId,
    /// The world this location belongs to.
    pub world_id: WorldId,
    /// Location name.
    pub name: String,
    /// Condition.
    pub status: LocationStatus,
    /// The faction controlling this location, if any.
    pub controlled_by: Option<FactionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_arc_reports_active() {
        let arc = NarrativeArc {
            id: ArcId::new(),
            world_id: WorldId::new(),
            arc_number: 1,
            status: ArcStatus::Active,
            current_beat_id: None,
            summary: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert!(arc.is_active());
    }

    #[test]
    fn world_event_roundtrip_serde() {
        let event = WorldEvent {
            id: WorldEventId::new(),
            world_id: WorldId::new(),
            arc_id: Some(ArcId::new()),
            beat_id: None,
            impact: ImpactLevel::Major,
            category: EventCategory::PlayerAction,
            description: String::from("The bridge at Karth collapsed."),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).ok();
        assert!(json.is_some());
        let restored: Result<WorldEvent, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok().as_ref(), Some(&event));
    }
}
