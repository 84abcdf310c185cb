//! Shared type definitions for the Chronicle narrative engine.
//!
//! This crate is the single source of truth for all types used across the
//! Chronicle workspace: entity structs, generation drafts, and the typed
//! topic/payload union carried by the event bus.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (arc status, beat type, impact levels)
//! - [`entities`] -- Core entity structs (worlds, arcs, beats, world events)
//! - [`drafts`] -- Structured output shapes returned by the generation port
//! - [`payloads`] -- Topic names and per-topic payload structs for the bus

pub mod drafts;
pub mod entities;
pub mod enums;
pub mod ids;
pub mod payloads;

// Re-export all public types at crate root for convenience.
pub use drafts::{AnchorDraft, BeatDraft};
pub use entities::{Character, Faction, Location, NarrativeArc, StoryBeat, World, WorldEvent};
pub use enums::{
    ArcStatus, BeatType, CharacterStatus, EventCategory, FactionStatus, ImpactLevel,
    LocationStatus,
};
pub use ids::{ArcId, BeatId, CharacterId, FactionId, LocationId, WorldEventId, WorldId};
pub use payloads::{
    ArcCompleted, BeatCreated, CharacterStatusChanged, FactionCreated, FactionLostLocation,
    FactionStatusChanged, FactionTookLocation, LocationStatusChanged, Topic, TopicPayload,
    WorldEventLogged,
};
