//! Text codecs between domain enums and their database representation.
//!
//! Enums are stored as snake_case TEXT columns. Decoding an unknown value
//! is a [`DbError::Decode`]: it means the schema and the code disagree.

use chronicle_types::{
    ArcStatus, BeatType, CharacterStatus, EventCategory, FactionStatus, ImpactLevel,
    LocationStatus,
};

use crate::error::DbError;

/// Database text for an [`ArcStatus`].
pub const fn arc_status_to_db(status: ArcStatus) -> &'static str {
    match status {
        ArcStatus::Active => "active",
        ArcStatus::Completed => "completed",
    }
}

/// Decode an [`ArcStatus`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn arc_status_from_db(value: &str) -> Result<ArcStatus, DbError> {
    match value {
        "active" => Ok(ArcStatus::Active),
        "completed" => Ok(ArcStatus::Completed),
        other => Err(DbError::Decode(format!("unknown arc status: {other}"))),
    }
}

/// Database text for a [`BeatType`].
pub const fn beat_type_to_db(beat_type: BeatType) -> &'static str {
    match beat_type {
        BeatType::Anchor => "anchor",
        BeatType::Dynamic => "dynamic",
    }
}

/// Decode a [`BeatType`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn beat_type_from_db(value: &str) -> Result<BeatType, DbError> {
    match value {
        "anchor" => Ok(BeatType::Anchor),
        "dynamic" => Ok(BeatType::Dynamic),
        other => Err(DbError::Decode(format!("unknown beat type: {other}"))),
    }
}

/// Database text for an [`ImpactLevel`].
pub const fn impact_to_db(impact: ImpactLevel) -> &'static str {
    match impact {
        ImpactLevel::Minor => "minor",
        ImpactLevel::Moderate => "moderate",
        ImpactLevel::Major => "major",
        ImpactLevel::Catastrophic => "catastrophic",
    }
}

/// Decode an [`ImpactLevel`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn impact_from_db(value: &str) -> Result<ImpactLevel, DbError> {
    match value {
        "minor" => Ok(ImpactLevel::Minor),
        "moderate" => Ok(ImpactLevel::Moderate),
        "major" => Ok(ImpactLevel::Major),
        "catastrophic" => Ok(ImpactLevel::Catastrophic),
        other => Err(DbError::Decode(format!("unknown impact level: {other}"))),
    }
}

/// Database text for an [`EventCategory`].
pub const fn category_to_db(category: EventCategory) -> &'static str {
    match category {
        EventCategory::PlayerAction => "player_action",
        EventCategory::SystemEvent => "system_event",
        EventCategory::FactionEvent => "faction_event",
        EventCategory::CharacterEvent => "character_event",
        EventCategory::LocationEvent => "location_event",
    }
}

/// Decode an [`EventCategory`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn category_from_db(value: &str) -> Result<EventCategory, DbError> {
    match value {
        "player_action" => Ok(EventCategory::PlayerAction),
        "system_event" => Ok(EventCategory::SystemEvent),
        "faction_event" => Ok(EventCategory::FactionEvent),
        "character_event" => Ok(EventCategory::CharacterEvent),
        "location_event" => Ok(EventCategory::LocationEvent),
        other => Err(DbError::Decode(format!("unknown event category: {other}"))),
    }
}

/// Database text for a [`FactionStatus`].
pub const fn faction_status_to_db(status: FactionStatus) -> &'static str {
    match status {
        FactionStatus::Rising => "rising",
        FactionStatus::Stable => "stable",
        FactionStatus::Declining => "declining",
        FactionStatus::Collapsed => "collapsed",
    }
}

/// Decode a [`FactionStatus`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn faction_status_from_db(value: &str) -> Result<FactionStatus, DbError> {
    match value {
        "rising" => Ok(FactionStatus::Rising),
        "stable" => Ok(FactionStatus::Stable),
        "declining" => Ok(FactionStatus::Declining),
        "collapsed" => Ok(FactionStatus::Collapsed),
        other => Err(DbError::Decode(format!("unknown faction status: {other}"))),
    }
}

/// Database text for a [`CharacterStatus`].
pub const fn character_status_to_db(status: CharacterStatus) -> &'static str {
    match status {
        CharacterStatus::Active => "active",
        CharacterStatus::Missing => "missing",
        CharacterStatus::Deceased => "deceased",
    }
}

/// Decode a [`CharacterStatus`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn character_status_from_db(value: &str) -> Result<CharacterStatus, DbError> {
    match value {
        "active" => Ok(CharacterStatus::Active),
        "missing" => Ok(CharacterStatus::Missing),
        "deceased" => Ok(CharacterStatus::Deceased),
        other => Err(DbError::Decode(format!("unknown character status: {other}"))),
    }
}

/// Database text for a [`LocationStatus`].
pub const fn location_status_to_db(status: LocationStatus) -> &'static str {
    match status {
        LocationStatus::Thriving => "thriving",
        LocationStatus::Stable => "stable",
        LocationStatus::Declining => "declining",
        LocationStatus::Ruined => "ruined",
        LocationStatus::Contested => "contested",
    }
}

/// Decode a [`LocationStatus`] from its database text.
///
/// # Errors
///
/// Returns [`DbError::Decode`] for an unknown value.
pub fn location_status_from_db(value: &str) -> Result<LocationStatus, DbError> {
    match value {
        "thriving" => Ok(LocationStatus::Thriving),
        "stable" => Ok(LocationStatus::Stable),
        "declining" => Ok(LocationStatus::Declining),
        "ruined" => Ok(LocationStatus::Ruined),
        "contested" => Ok(LocationStatus::Contested),
        other => Err(DbError::Decode(format!("unknown location status: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_texts_roundtrip() {
        for status in [ArcStatus::Active, ArcStatus::Completed] {
            assert_eq!(arc_status_from_db(arc_status_to_db(status)).ok(), Some(status));
        }
        for impact in [
            ImpactLevel::Minor,
            ImpactLevel::Moderate,
            ImpactLevel::Major,
            ImpactLevel::Catastrophic,
        ] {
            assert_eq!(impact_from_db(impact_to_db(impact)).ok(), Some(impact));
        }
    }

    #[test]
    fn unknown_text_is_decode_error() {
        assert!(matches!(
            beat_type_from_db("interlude"),
            Err(DbError::Decode(_))
        ));
    }
}
