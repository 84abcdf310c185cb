//! Reactive faction, character, and location modules for the Chronicle
//! narrative engine.
//!
//! Each module independently subscribes to the topics it cares about,
//! mutates only its own entities, appends entries to its own history log,
//! and republishes secondary events carrying the incoming envelope's
//! incremented hop count. Modules never call each other directly; all
//! coordination is choreography over the bus, bounded by the bus's hop
//! guard.
//!
//! # Modules
//!
//! - [`faction`] -- Standing, held locations, and reactions to ruined
//!   territory.
//! - [`character`] -- Narrative state and reactions to ruined places.
//! - [`location`] -- Condition, controlling faction, and reactions to
//!   takeovers and lost claims.
//! - [`store`] -- The persistence ports the modules consume.
//! - [`memory`] -- In-memory store doubles for tests and offline runs.

pub mod character;
pub mod error;
pub mod faction;
pub mod location;
pub mod memory;
pub mod store;

pub use character::CharacterReactor;
pub use error::ModuleError;
pub use faction::FactionReactor;
pub use location::LocationReactor;
pub use store::{CharacterStore, FactionStore, LocationStore, ReactorError};
