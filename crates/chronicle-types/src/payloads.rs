//! Topic names and per-topic payload structs for the event bus.
//!
//! Payloads form a tagged union: every topic has exactly one payload struct,
//! and [`TopicPayload`] ties them together so handlers can pattern-match
//! without dynamic typing. The bus wraps a payload in an envelope at publish
//! time; payloads themselves carry no hop count or timestamp.

use serde::{Deserialize, Serialize};

use crate::enums::{CharacterStatus, FactionStatus, ImpactLevel, LocationStatus};
use crate::ids::{ArcId, BeatId, CharacterId, FactionId, LocationId, WorldEventId, WorldId};

/// The set of topics modules publish and subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// A world event was persisted by some module.
    WorldEventLogged,
    /// The lifecycle controller persisted a new beat.
    BeatCreated,
    /// The lifecycle controller completed an arc.
    ArcCompleted,
    /// The faction module created a faction.
    FactionCreated,
    /// A faction's standing changed.
    FactionStatusChanged,
    /// A faction took control of a location.
    FactionTookLocation,
    /// A faction lost control of a location.
    FactionLostLocation,
    /// A location's condition changed.
    LocationStatusChanged,
    /// A character's narrative state changed.
    CharacterStatusChanged,
}

impl Topic {
    /// Dotted wire name for logs and external consumers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldEventLogged => "world.event.logged",
            Self::BeatCreated => "beat.created",
            Self::ArcCompleted => "arc.completed",
            Self::FactionCreated => "faction.created",
            Self::FactionStatusChanged => "faction.status_changed",
            Self::FactionTookLocation => "faction.took_location",
            Self::FactionLostLocation => "faction.lost_location",
            Self::LocationStatusChanged => "location.status_changed",
            Self::CharacterStatusChanged => "character.status_changed",
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for [`Topic::WorldEventLogged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldEventLogged {
    /// The world the event belongs to.
    pub world_id: WorldId,
    /// The persisted event's identifier.
    pub event_id: WorldEventId,
    /// Narrative weight; the aggregator counts severe impacts.
    pub impact: ImpactLevel,
    /// Free-text description of what happened.
    pub description: String,
}

/// Payload for [`Topic::BeatCreated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatCreated {
    /// The world the beat belongs to.
    pub world_id: WorldId,
    /// The arc the beat belongs to.
    pub arc_id: ArcId,
    /// The persisted beat's identifier.
    pub beat_id: BeatId,
    /// Position within the arc.
    pub beat_index: u8,
    /// Directives for downstream modules.
    pub directives: Vec<String>,
    /// Emergent storylines this beat opens or advances.
    pub emergent: Vec<String>,
}

/// Payload for [`Topic::ArcCompleted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcCompleted {
    /// The world the arc belongs to.
    pub world_id: WorldId,
    /// The completed arc.
    pub arc_id: ArcId,
    /// The summary written at completion.
    pub summary: String,
}

/// Payload for [`Topic::FactionCreated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionCreated {
    /// The world the faction belongs to.
    pub world_id: WorldId,
    /// The new faction.
    pub faction_id: FactionId,
    /// Faction name.
    pub name: String,
}

/// Payload for [`Topic::FactionStatusChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionStatusChanged {
    /// The world the faction belongs to.
    pub world_id: WorldId,
    /// The faction whose standing changed.
    pub faction_id: FactionId,
    /// Standing before the change.
    pub previous_status: FactionStatus,
    /// Standing after the change.
    pub new_status: FactionStatus,
}

/// Payload for [`Topic::FactionTookLocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionTookLocation {
    /// The world involved.
    pub world_id: WorldId,
    /// The faction taking control.
    pub faction_id: FactionId,
    /// The location taken.
    pub location_id: LocationId,
}

/// Payload for [`Topic::FactionLostLocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionLostLocation {
    /// The world involved.
    pub world_id: WorldId,
    /// The faction losing control.
    pub faction_id: FactionId,
    /// The location lost.
    pub location_id: LocationId,
}

/// Payload for [`Topic::LocationStatusChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStatusChanged {
    /// The world the location belongs to.
    pub world_id: WorldId,
    /// The location whose condition changed.
    pub location_id: LocationId,
    /// Condition before the change.
    pub previous_status: LocationStatus,
    /// Condition after the change.
    pub new_status: LocationStatus,
}

/// Payload for [`Topic::CharacterStatusChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStatusChanged {
    /// The world the character belongs to.
    pub world_id: WorldId,
    /// The character whose state changed.
    pub character_id: CharacterId,
    /// State before the change.
    pub previous_status: CharacterStatus,
    /// State after the change.
    pub new_status: CharacterStatus,
}

/// The tagged union of every payload the bus can carry.
///
/// Each variant corresponds to exactly one [`Topic`]; the bus derives the
/// topic from the payload so a payload can never be published under the
/// wrong topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum TopicPayload {
    /// See [`WorldEventLogged`].
    WorldEventLogged(WorldEventLogged),
    /// See [`BeatCreated`].
    BeatCreated(BeatCreated),
    /// See [`ArcCompleted`].
    ArcCompleted(ArcCompleted),
    /// See [`FactionCreated`].
    FactionCreated(FactionCreated),
    /// See [`FactionStatusChanged`].
    FactionStatusChanged(FactionStatusChanged),
    /// See [`FactionTookLocation`].
    FactionTookLocation(FactionTookLocation),
    /// See [`FactionLostLocation`].
    FactionLostLocation(FactionLostLocation),
    /// See [`LocationStatusChanged`].
    LocationStatusChanged(LocationStatusChanged),
    /// See [`CharacterStatusChanged`].
    CharacterStatusChanged(CharacterStatusChanged),
}

impl TopicPayload {
    /// The topic this payload is published under.
    pub const fn topic(&self) -> Topic {
        match self {
            Self::WorldEventLogged(_) => Topic::WorldEventLogged,
            Self::BeatCreated(_) => Topic::BeatCreated,
            Self::ArcCompleted(_) => Topic::ArcCompleted,
            Self::FactionCreated(_) => Topic::FactionCreated,
            Self::FactionStatusChanged(_) => Topic::FactionStatusChanged,
            Self::FactionTookLocation(_) => Topic::FactionTookLocation,
            Self::FactionLostLocation(_) => Topic::FactionLostLocation,
            Self::LocationStatusChanged(_) => Topic::LocationStatusChanged,
            Self::CharacterStatusChanged(_) => Topic::CharacterStatusChanged,
        }
    }

    /// The world this payload concerns.
    pub const fn world_id(&self) -> WorldId {
        match self {
            Self::WorldEventLogged(p) => p.world_id,
            Self::BeatCreated(p) => p.world_id,
            Self::ArcCompleted(p) => p.world_id,
            Self::FactionCreated(p) => p.world_id,
            Self::FactionStatusChanged(p) => p.world_id,
            Self::FactionTookLocation(p) => p.world_id,
            Self::FactionLostLocation(p) => p.world_id,
            Self::LocationStatusChanged(p) => p.world_id,
            Self::CharacterStatusChanged(p) => p.world_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_topic_mapping() {
        let payload = TopicPayload::BeatCreated(BeatCreated {
            world_id: WorldId::new(),
            arc_id: ArcId::new(),
            beat_id: BeatId::new(),
            beat_index: 1,
            directives: Vec::new(),
            emergent: Vec::new(),
        });
        assert_eq!(payload.topic(), Topic::BeatCreated);
        assert_eq!(payload.topic().as_str(), "beat.created");
    }

    #[test]
    fn world_id_extraction() {
        let world_id = WorldId::new();
        let payload = TopicPayload::ArcCompleted(ArcCompleted {
            world_id,
            arc_id: ArcId::new(),
            summary: String::from("It ended."),
        });
        assert_eq!(payload.world_id(), world_id);
    }

    #[test]
    fn payload_serializes_with_topic_tag() {
        let payload = TopicPayload::WorldEventLogged(WorldEventLogged {
            world_id: WorldId::new(),
            event_id: WorldEventId::new(),
            impact: ImpactLevel::Major,
            description: String::from("test"),
        });
        let json = serde_json::to_string(&payload).unwrap_or_default();
        assert!(json.contains("\"topic\":\"world_event_logged\""));
    }
}
