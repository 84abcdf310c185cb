//! Enumeration types for the Chronicle narrative engine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a narrative arc.
///
/// An arc is created `Active` and transitions to `Completed` exactly once,
/// when its fifteenth beat slot is filled. Completed arcs are immutable
/// except for the summary written during the completion transition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcStatus {
    /// The arc is in progress and accepting new beats.
    Active,
    /// The arc has all 15 beats and a summary; no further mutation.
    Completed,
}

/// Whether a beat was pre-planned at arc creation or generated on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    /// One of the three fixed-index beats (0, 7, 14) generated together
    /// at arc creation.
    Anchor,
    /// A beat generated on demand to fill the next open index.
    Dynamic,
}

/// Narrative weight of a world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Background color; never triggers progression on its own.
    Minor,
    /// Noticeable but routine.
    Moderate,
    /// A significant development.
    Major,
    /// A world-altering development.
    Catastrophic,
}

impl ImpactLevel {
    /// Whether this impact level counts toward the aggregator's
    /// beat-generation threshold.
    pub const fn is_severe(self) -> bool {
        matches!(self, Self::Major | Self::Catastrophic)
    }

    /// Uppercase label used in generation-context event lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minor => "MINOR",
            Self::Moderate => "MODERATE",
            Self::Major => "MAJOR",
            Self::Catastrophic => "CATASTROPHIC",
        }
    }
}

impl core::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which kind of actor produced a world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// A player-initiated action.
    PlayerAction,
    /// An event the engine itself records (beat creation, arc completion).
    SystemEvent,
    /// A secondary event produced by the faction module.
    FactionEvent,
    /// A secondary event produced by the character module.
    CharacterEvent,
    /// A secondary event produced by the location module.
    LocationEvent,
}

/// Political standing of a faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionStatus {
    /// Gaining influence.
    Rising,
    /// Holding steady.
    Stable,
    /// Losing influence.
    Declining,
    /// No longer a functioning power.
    Collapsed,
}

/// Narrative state of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    /// Present and available to the story.
    Active,
    /// Whereabouts unknown.
    Missing,
    /// Dead; only referenced in past tense.
    Deceased,
}

/// Condition of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    /// Prosperous and growing.
    Thriving,
    /// Ordinary condition.
    Stable,
    /// Falling into disrepair.
    Declining,
    /// Destroyed or uninhabitable.
    Ruined,
    /// Multiple factions claim it.
    Contested,
}
