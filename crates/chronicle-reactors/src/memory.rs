//! In-memory reactor stores for tests and offline runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chronicle_types::{Character, CharacterId, Faction, FactionId, Location, LocationId, WorldId};

use crate::store::{CharacterStore, FactionStore, LocationStore, ReactorError};

fn poisoned() -> ReactorError {
    ReactorError::Backend(String::from("memory store lock poisoned"))
}

#[derive(Debug, Default)]
struct FactionState {
    factions: Vec<Faction>,
    history: BTreeMap<FactionId, Vec<String>>,
}

/// Mutex-guarded in-memory [`FactionStore`].
#[derive(Debug, Default)]
pub struct MemoryFactionStore {
    state: Mutex<FactionState>,
}

impl MemoryFactionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The history log for a faction, oldest first.
    pub fn history(&self, faction_id: FactionId) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.history.get(&faction_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, FactionState>, ReactorError> {
        self.state.lock().map_err(|_| poisoned())
    }
}

impl FactionStore for MemoryFactionStore {
    async fn get_faction(&self, faction_id: FactionId) -> Result<Faction, ReactorError> {
        let state = self.lock()?;
        state
            .factions
            .iter()
            .find(|faction| faction.id == faction_id)
            .cloned()
            .ok_or(ReactorError::NotFound {
                entity: "faction",
                id: faction_id.to_string(),
            })
    }

    async fn list_factions(&self, world_id: WorldId) -> Result<Vec<Faction>, ReactorError> {
        let state = self.lock()?;
        Ok(state
            .factions
            .iter()
            .filter(|faction| faction.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn insert_faction(&self, faction: &Faction) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        state.factions.push(faction.clone());
        Ok(())
    }

    async fn update_faction(&self, faction: &Faction) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        let Some(existing) = state.factions.iter_mut().find(|f| f.id == faction.id) else {
            return Err(ReactorError::NotFound {
                entity: "faction",
                id: faction.id.to_string(),
            });
        };
        *existing = faction.clone();
        Ok(())
    }

    async fn append_faction_history(
        &self,
        faction_id: FactionId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        state
            .history
            .entry(faction_id)
            .or_default()
            .push(entry.to_owned());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CharacterState {
    characters: Vec<Character>,
    history: BTreeMap<CharacterId, Vec<String>>,
}

/// Mutex-guarded in-memory [`CharacterStore`].
#[derive(Debug, Default)]
pub struct MemoryCharacterStore {
    state: Mutex<CharacterState>,
}

impl MemoryCharacterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a character directly, bypassing the reactor.
    pub fn seed(&self, character: Character) {
        if let Ok(mut state) = self.state.lock() {
            state.characters.push(character);
        }
    }

    /// The history log for a character, oldest first.
    pub fn history(&self, character_id: CharacterId) -> Vec<String> {
        self.state
            .lock()
            .map(|state| {
                state
                    .history
                    .get(&character_id)
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CharacterState>, ReactorError> {
        self.state.lock().map_err(|_| poisoned())
    }
}

impl CharacterStore for MemoryCharacterStore {
    async fn get_character(&self, character_id: CharacterId) -> Result<Character, ReactorError> {
        let state = self.lock()?;
        state
            .characters
            .iter()
            .find(|character| character.id == character_id)
            .cloned()
            .ok_or(ReactorError::NotFound {
                entity: "character",
                id: character_id.to_string(),
            })
    }

    async fn list_characters(&self, world_id: WorldId) -> Result<Vec<Character>, ReactorError> {
        let state = self.lock()?;
        Ok(state
            .characters
            .iter()
            .filter(|character| character.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn update_character(&self, character: &Character) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        let Some(existing) = state.characters.iter_mut().find(|c| c.id == character.id) else {
            return Err(ReactorError::NotFound {
                entity: "character",
                id: character.id.to_string(),
            });
        };
        *existing = character.clone();
        Ok(())
    }

    async fn append_character_history(
        &self,
        character_id: CharacterId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        state
            .history
            .entry(character_id)
            .or_default()
            .push(entry.to_owned());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LocationState {
    locations: Vec<Location>,
    history: BTreeMap<LocationId, Vec<String>>,
}

/// Mutex-guarded in-memory [`LocationStore`].
#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    state: Mutex<LocationState>,
}

impl MemoryLocationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a location directly, bypassing the reactor.
    pub fn seed(&self, location: Location) {
        if let Ok(mut state) = self.state.lock() {
            state.locations.push(location);
        }
    }

    /// The history log for a location, oldest first.
    pub fn history(&self, location_id: LocationId) -> Vec<String> {
        self.state
            .lock()
            .map(|state| {
                state
                    .history
                    .get(&location_id)
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LocationState>, ReactorError> {
        self.state.lock().map_err(|_| poisoned())
    }
}

impl LocationStore for MemoryLocationStore {
    async fn get_location(&self, location_id: LocationId) -> Result<Location, ReactorError> {
        let state = self.lock()?;
        state
            .locations
            .iter()
            .find(|location| location.id == location_id)
            .cloned()
            .ok_or(ReactorError::NotFound {
                entity: "location",
                id: location_id.to_string(),
            })
    }

    async fn list_locations(&self, world_id: WorldId) -> Result<Vec<Location>, ReactorError> {
        let state = self.lock()?;
        Ok(state
            .locations
            .iter()
            .filter(|location| location.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn update_location(&self, location: &Location) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        let Some(existing) = state.locations.iter_mut().find(|l| l.id == location.id) else {
            return Err(ReactorError::NotFound {
                entity: "location",
                id: location.id.to_string(),
            });
        };
        *existing = location.clone();
        Ok(())
    }

    async fn append_location_history(
        &self,
        location_id: LocationId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        let mut state = self.lock()?;
        state
            .history
            .entry(location_id)
            .or_default()
            .push(entry.to_owned());
        Ok(())
    }
}
