//! `PostgreSQL` persistence adapters for the Chronicle narrative engine.
//!
//! Implements the engine's [`NarrativeStore`] port and the reactors'
//! store ports over one connection pool. The engine and reactors never see
//! SQL; they consume the traits, and this crate maps rows and enum texts
//! to the domain types.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration, and migrations.
//! - [`narrative_store`] -- Worlds, arcs, beats, and world events.
//! - [`module_store`] -- Factions, characters, locations, and their
//!   history logs.
//! - [`codec`] -- Enum/text codecs for status columns.
//! - [`error`] -- Shared error types.
//!
//! [`NarrativeStore`]: chronicle_engine::ports::NarrativeStore

pub mod codec;
pub mod error;
pub mod module_store;
pub mod narrative_store;
pub mod postgres;

pub use error::DbError;
pub use module_store::{PgCharacterStore, PgFactionStore, PgLocationStore};
pub use narrative_store::PgNarrativeStore;
pub use postgres::{PostgresConfig, PostgresPool};
