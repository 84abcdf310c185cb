//! Persistence ports for the reactive modules.
//!
//! Each module owns its entities and its own append-only history log; the
//! traits here are what the Postgres adapters and the in-memory doubles
//! implement. History entries are free text stamped by the store.

use std::future::Future;
use std::sync::Arc;

use chronicle_types::{Character, CharacterId, Faction, FactionId, Location, LocationId, WorldId};

/// Errors from a reactor's persistence port.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"faction"`.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// The storage backend failed.
    #[error("reactor store backend error: {0}")]
    Backend(String),
}

/// Persistence for the faction module.
pub trait FactionStore: Send + Sync {
    /// Fetch a faction by ID.
    fn get_faction(
        &self,
        faction_id: FactionId,
    ) -> impl Future<Output = Result<Faction, ReactorError>> + Send;

    /// All factions in a world.
    fn list_factions(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Faction>, ReactorError>> + Send;

    /// Insert a new faction.
    fn insert_faction(
        &self,
        faction: &Faction,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;

    /// Overwrite a faction's mutable fields (status, holdings).
    fn update_faction(
        &self,
        faction: &Faction,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;

    /// Append one entry to the faction's history log.
    fn append_faction_history(
        &self,
        faction_id: FactionId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;
}

/// Persistence for the character module.
pub trait CharacterStore: Send + Sync {
    /// Fetch a character by ID.
    fn get_character(
        &self,
        character_id: CharacterId,
    ) -> impl Future<Output = Result<Character, ReactorError>> + Send;

    /// All characters in a world.
    fn list_characters(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Character>, ReactorError>> + Send;

    /// Overwrite a character's mutable fields (status, alignment, place).
    fn update_character(
        &self,
        character: &Character,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;

    /// Append one entry to the character's history log.
    fn append_character_history(
        &self,
        character_id: CharacterId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;
}

/// Persistence for the location module.
pub trait LocationStore: Send + Sync {
    /// Fetch a location by ID.
    fn get_location(
        &self,
        location_id: LocationId,
    ) -> impl Future<Output = Result<Location, ReactorError>> + Send;

    /// All locations in a world.
    fn list_locations(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Location>, ReactorError>> + Send;

    /// Overwrite a location's mutable fields (status, controller).
    fn update_location(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;

    /// Append one entry to the location's history log.
    fn append_location_history(
        &self,
        location_id: LocationId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send;
}

// Shared-ownership delegation, matching the engine's port traits.

impl<T: FactionStore> FactionStore for Arc<T> {
    fn get_faction(
        &self,
        faction_id: FactionId,
    ) -> impl Future<Output = Result<Faction, ReactorError>> + Send {
        (**self).get_faction(faction_id)
    }

    fn list_factions(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Faction>, ReactorError>> + Send {
        (**self).list_factions(world_id)
    }

    fn insert_faction(
        &self,
        faction: &Faction,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).insert_faction(faction)
    }

    fn update_faction(
        &self,
        faction: &Faction,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).update_faction(faction)
    }

    fn append_faction_history(
        &self,
        faction_id: FactionId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).append_faction_history(faction_id, entry)
    }
}

impl<T: CharacterStore> CharacterStore for Arc<T> {
    fn get_character(
        &self,
        character_id: CharacterId,
    ) -> impl Future<Output = Result<Character, ReactorError>> + Send {
        (**self).get_character(character_id)
    }

    fn list_characters(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Character>, ReactorError>> + Send {
        (**self).list_characters(world_id)
    }

    fn update_character(
        &self,
        character: &Character,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).update_character(character)
    }

    fn append_character_history(
        &self,
        character_id: CharacterId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).append_character_history(character_id, entry)
    }
}

impl<T: LocationStore> LocationStore for Arc<T> {
    fn get_location(
        &self,
        location_id: LocationId,
    ) -> impl Future<Output = Result<Location, ReactorError>> + Send {
        (**self).get_location(location_id)
    }

    fn list_locations(
        &self,
        world_id: WorldId,
    ) -> impl Future<Output = Result<Vec<Location>, ReactorError>> + Send {
        (**self).list_locations(world_id)
    }

    fn update_location(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).update_location(location)
    }

    fn append_location_history(
        &self,
        location_id: LocationId,
        entry: &str,
    ) -> impl Future<Output = Result<(), ReactorError>> + Send {
        (**self).append_location_history(location_id, entry)
    }
}
