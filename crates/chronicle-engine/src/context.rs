//! Generation context assembly.
//!
//! Before each generation call the controller gathers a read-only picture
//! of the world: previous beats, the anchor the story is heading toward,
//! recent events, and snapshots of factions, characters, and locations.
//! Nothing here is mutated -- the snapshots exist purely so generated text
//! stays consistent with world state. The structs serialize cleanly so the
//! generation adapter can feed them to prompt templates.

use serde::Serialize;

use chronicle_types::{
    Character, Faction, Location, NarrativeArc, StoryBeat, World, WorldEvent,
};

/// Read-only entity snapshots shared by anchor and beat contexts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorldSnapshots {
    /// Factions in the world.
    pub factions: Vec<Faction>,
    /// Characters in the world.
    pub characters: Vec<Character>,
    /// Locations in the world.
    pub locations: Vec<Location>,
}

/// Context for generating the three anchors of a new arc.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorContext {
    /// The world the arc is being created for.
    pub world: World,
    /// The sequence number the new arc will carry.
    pub arc_number: u32,
    /// Entity snapshots for narrative consistency.
    pub snapshots: WorldSnapshots,
}

/// Context for generating the next dynamic beat.
#[derive(Debug, Clone, Serialize)]
pub struct BeatContext {
    /// The world being progressed.
    pub world: World,
    /// The active arc.
    pub arc: NarrativeArc,
    /// The index the new beat will occupy.
    pub next_index: u8,
    /// All beats with an index below `next_index`, in ascending order.
    pub previous_beats: Vec<StoryBeat>,
    /// The anchor the story is heading toward.
    pub next_anchor: StoryBeat,
    /// Recent events formatted as `[IMPACT • date] description` lines,
    /// oldest first.
    pub recent_events: Vec<String>,
    /// Entity snapshots for narrative consistency.
    pub snapshots: WorldSnapshots,
}

/// Context for summarizing a finished arc.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryContext {
    /// The world the arc belongs to.
    pub world: World,
    /// The arc being completed.
    pub arc: NarrativeArc,
    /// Every beat of the arc, ordered by index.
    pub beats: Vec<StoryBeat>,
}

/// Format one world event as a generation-context line:
/// `[IMPACT • YYYY-MM-DD] description`.
pub fn format_event_line(event: &WorldEvent) -> String {
    format!(
        "[{} \u{2022} {}] {}",
        event.impact.label(),
        event.created_at.format("%Y-%m-%d"),
        event.description
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use chronicle_types::{EventCategory, ImpactLevel, WorldEventId, WorldId};

    use super::*;

    #[test]
    fn event_line_format() {
        let event = WorldEvent {
            id: WorldEventId::new(),
            world_id: WorldId::new(),
            arc_id: None,
            beat_id: None,
            impact: ImpactLevel::Catastrophic,
            category: EventCategory::PlayerAction,
            description: String::from("The capital burned."),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap_or_default(),
        };
        assert_eq!(
            format_event_line(&event),
            "[CATASTROPHIC \u{2022} 2026-03-14] The capital burned."
        );
    }
}
