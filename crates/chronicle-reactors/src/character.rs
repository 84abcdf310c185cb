//! The character module.
//!
//! Owns character entities: narrative state, faction alignment, current
//! place, and the character history log. Reacts to
//! `location.status_changed`: characters at a ruined location go missing,
//! announced with the envelope's incremented hop count. A character who is
//! already missing or deceased is left alone, so duplicate deliveries are
//! harmless.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chronicle_bus::{EventBus, SubscriptionId};
use chronicle_types::{
    CharacterId, CharacterStatus, CharacterStatusChanged, LocationId, LocationStatus, Topic,
    TopicPayload, WorldId,
};

use crate::error::ModuleError;
use crate::store::CharacterStore;

/// The character reactive module.
pub struct CharacterReactor<S> {
    store: S,
    bus: Arc<EventBus>,
}

impl<S> CharacterReactor<S>
where
    S: CharacterStore + 'static,
{
    /// Create the module over its store and the shared bus.
    pub const fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Subscribe to the topics this module reacts to.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let module = Arc::clone(self);
        bus.subscribe(Topic::LocationStatusChanged, move |envelope| {
            let module = Arc::clone(&module);
            async move {
                let hop = envelope.next_hop();
                if let TopicPayload::LocationStatusChanged(payload) = envelope.payload {
                    if payload.new_status == LocationStatus::Ruined {
                        if let Err(e) = module
                            .on_location_ruined(payload.world_id, payload.location_id, hop)
                            .await
                        {
                            warn!(
                                location_id = %payload.location_id,
                                error = %e,
                                "character reaction to ruined location skipped"
                            );
                        }
                    }
                }
                Ok(())
            }
        })
    }

    /// Change a character's narrative state. Setting the current state
    /// again is a no-op and publishes nothing.
    pub async fn set_status(
        &self,
        character_id: CharacterId,
        new_status: CharacterStatus,
    ) -> Result<(), ModuleError> {
        self.set_status_at(character_id, new_status, 0).await
    }

    async fn set_status_at(
        &self,
        character_id: CharacterId,
        new_status: CharacterStatus,
        hop_count: u8,
    ) -> Result<(), ModuleError> {
        let mut character = self.store.get_character(character_id).await?;
        if character.status == new_status {
            debug!(character_id = %character_id, "character state unchanged, skipping");
            return Ok(());
        }
        let previous_status = character.status;
        character.status = new_status;
        self.store.update_character(&character).await?;
        self.store
            .append_character_history(
                character_id,
                &format!("State shifted from {previous_status:?} to {new_status:?}."),
            )
            .await?;

        self.bus
            .publish(
                TopicPayload::CharacterStatusChanged(CharacterStatusChanged {
                    world_id: character.world_id,
                    character_id,
                    previous_status,
                    new_status,
                }),
                hop_count,
            )
            .await?;

        info!(
            character_id = %character_id,
            ?previous_status,
            ?new_status,
            hop_count,
            "character state changed"
        );
        Ok(())
    }

    /// A location was ruined: active characters there go missing. The dead
    /// stay dead and the already-missing stay missing.
    async fn on_location_ruined(
        &self,
        world_id: WorldId,
        location_id: LocationId,
        hop_count: u8,
    ) -> Result<(), ModuleError> {
        let characters = self.store.list_characters(world_id).await?;
        for character in characters {
            if character.location_id == Some(location_id)
                && character.status == CharacterStatus::Active
            {
                self.set_status_at(character.id, CharacterStatus::Missing, hop_count)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chronicle_types::{Character, LocationStatusChanged};

    use super::*;
    use crate::memory::MemoryCharacterStore;

    fn module() -> (
        Arc<CharacterReactor<Arc<MemoryCharacterStore>>>,
        Arc<MemoryCharacterStore>,
        Arc<EventBus>,
        WorldId,
    ) {
        let store = Arc::new(MemoryCharacterStore::new());
        let bus = Arc::new(EventBus::default());
        let world_id = WorldId::new();
        let module = Arc::new(CharacterReactor::new(Arc::clone(&store), Arc::clone(&bus)));
        module.attach(&bus);
        (module, store, bus, world_id)
    }

    fn character(world_id: WorldId, location_id: Option<LocationId>) -> Character {
        Character {
            id: CharacterId::new(),
            world_id,
            name: String::from("Maren"),
            status: CharacterStatus::Active,
            faction_id: None,
            location_id,
        }
    }

    #[tokio::test]
    async fn ruin_marks_residents_missing_with_incremented_hop() {
        let (_, store, bus, world_id) = module();
        let location_id = LocationId::new();
        let resident = character(world_id, Some(location_id));
        let elsewhere = character(world_id, Some(LocationId::new()));
        store.seed(resident.clone());
        store.seed(elsewhere.clone());

        let hops = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hops);
        bus.subscribe(Topic::CharacterStatusChanged, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(envelope.hop_count);
                Ok(())
            }
        });

        let ruin = TopicPayload::LocationStatusChanged(LocationStatusChanged {
            world_id,
            location_id,
            previous_status: LocationStatus::Stable,
            new_status: LocationStatus::Ruined,
        });
        bus.publish(ruin.clone(), 0).await.unwrap();
        // Duplicate delivery: resident is already missing, nothing changes.
        bus.publish(ruin, 0).await.unwrap();

        assert_eq!(*hops.lock().unwrap(), vec![1]);
        let stored = store.get_character(resident.id).await.unwrap();
        assert_eq!(stored.status, CharacterStatus::Missing);
        let unaffected = store.get_character(elsewhere.id).await.unwrap();
        assert_eq!(unaffected.status, CharacterStatus::Active);
    }

    #[tokio::test]
    async fn deceased_characters_stay_deceased() {
        let (module, store, bus, world_id) = module();
        let location_id = LocationId::new();
        let mut fallen = character(world_id, Some(location_id));
        fallen.status = CharacterStatus::Deceased;
        store.seed(fallen.clone());

        bus.publish(
            TopicPayload::LocationStatusChanged(LocationStatusChanged {
                world_id,
                location_id,
                previous_status: LocationStatus::Declining,
                new_status: LocationStatus::Ruined,
            }),
            0,
        )
        .await
        .unwrap();

        let stored = store.get_character(fallen.id).await.unwrap();
        assert_eq!(stored.status, CharacterStatus::Deceased);

        // Idempotent direct mutation too.
        module
            .set_status(fallen.id, CharacterStatus::Deceased)
            .await
            .unwrap();
        assert!(store.history(fallen.id).is_empty());
    }
}
