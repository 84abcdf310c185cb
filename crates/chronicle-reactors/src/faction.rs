//! The faction module.
//!
//! Owns faction entities: standing, held locations, and the faction history
//! log. Reacts to `location.status_changed`: when a location is ruined,
//! every faction holding it releases the claim and announces the loss with
//! the envelope's incremented hop count. All mutations are idempotent --
//! releasing a location a faction does not hold is a no-op, so duplicate
//! deliveries cannot corrupt state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chronicle_bus::{EventBus, SubscriptionId};
use chronicle_types::{
    Faction, FactionCreated, FactionId, FactionLostLocation, FactionStatus, FactionStatusChanged,
    FactionTookLocation, LocationId, LocationStatus, Topic, TopicPayload, WorldId,
};

use crate::error::ModuleError;
use crate::store::FactionStore;

/// The faction reactive module.
pub struct FactionReactor<S> {
    store: S,
    bus: Arc<EventBus>,
}

impl<S> FactionReactor<S>
where
    S: FactionStore + 'static,
{
    /// Create the module over its store and the shared bus.
    pub const fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Subscribe to the topics this module reacts to.
    ///
    /// Reaction failures are logged and skipped; the handler reports
    /// success to the bus so sibling subscribers still receive delivery.
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
                                "faction reaction to ruined location skipped"
                            );
                        }
                    }
                }
                Ok(())
            }
        })
    }

    /// Create a faction and announce it.
    pub async fn create_faction(
        &self,
        world_id: WorldId,
        name: &str,
        agenda: &str,
    ) -> Result<Faction, ModuleError> {
        let faction = Faction {
            id: FactionId::new(),
            world_id,
            name: name.to_owned(),
            status: FactionStatus::Stable,
            agenda: agenda.to_owned(),
            held_locations: Vec::new(),
        };
        self.store.insert_faction(&faction).await?;
        self.store
            .append_faction_history(faction.id, &format!("Founded: {agenda}"))
            .await?;

        self.bus
            .publish(
                TopicPayload::FactionCreated(FactionCreated {
                    world_id,
                    faction_id: faction.id,
                    name: faction.name.clone(),
                }),
                0,
            )
            .await?;

        info!(world_id = %world_id, faction_id = %faction.id, name, "faction created");
        Ok(faction)
    }

    /// Change a faction's standing. Setting the current status again is a
    /// no-op and publishes nothing.
    pub async fn set_status(
        &self,
        faction_id: FactionId,
        new_status: FactionStatus,
    ) -> Result<(), ModuleError> {
        let mut faction = self.store.get_faction(faction_id).await?;
        if faction.status == new_status {
            debug!(faction_id = %faction_id, "faction status unchanged, skipping");
            return Ok(());
        }
        let previous_status = faction.status;
        faction.status = new_status;
        self.store.update_faction(&faction).await?;
        self.store
            .append_faction_history(
                faction_id,
                &format!("Standing shifted from {previous_status:?} to {new_status:?}."),
            )
            .await?;

        self.bus
            .publish(
                TopicPayload::FactionStatusChanged(FactionStatusChanged {
                    world_id: faction.world_id,
                    faction_id,
                    previous_status,
                    new_status,
                }),
                0,
            )
            .await?;
        Ok(())
    }

    /// Claim a location for a faction. Claiming an already-held location
    /// is a no-op.
    pub async fn claim_location(
        &self,
        faction_id: FactionId,
        location_id: LocationId,
    ) -> Result<(), ModuleError> {
        let mut faction = self.store.get_faction(faction_id).await?;
        if faction.held_locations.contains(&location_id) {
            debug!(faction_id = %faction_id, location_id = %location_id, "already held, skipping");
            return Ok(());
        }
        faction.held_locations.push(location_id);
        self.store.update_faction(&faction).await?;
        self.store
            .append_faction_history(faction_id, &format!("Took control of location {location_id}."))
            .await?;

        self.bus
            .publish(
                TopicPayload::FactionTookLocation(FactionTookLocation {
                    world_id: faction.world_id,
                    faction_id,
                    location_id,
                }),
                0,
            )
            .await?;
        Ok(())
    }

    /// Release a faction's claim on a location. Releasing an unheld
    /// location is a no-op and publishes nothing.
    pub async fn release_location(
        &self,
        faction_id: FactionId,
        location_id: LocationId,
    ) -> Result<(), ModuleError> {
        self.release_location_at(faction_id, location_id, 0, "Released claim on")
            .await
    }

    /// Release with an explicit hop count, used by reactions so the
    /// outgoing event inherits the incremented hop.
    async fn release_location_at(
        &self,
        faction_id: FactionId,
        location_id: LocationId,
        hop_count: u8,
        reason: &str,
    ) -> Result<(), ModuleError> {
        let mut faction = self.store.get_faction(faction_id).await?;
        let before = faction.held_locations.len();
        faction.held_locations.retain(|held| *held != location_id);
        if faction.held_locations.len() == before {
            debug!(faction_id = %faction_id, location_id = %location_id, "not held, skipping");
            return Ok(());
        }
        self.store.update_faction(&faction).await?;
        self.store
            .append_faction_history(faction_id, &format!("{reason} location {location_id}."))
            .await?;

        self.bus
            .publish(
                TopicPayload::FactionLostLocation(FactionLostLocation {
                    world_id: faction.world_id,
                    faction_id,
                    location_id,
                }),
                hop_count,
            )
            .await?;
        Ok(())
    }

    /// A location was ruined: every faction holding it loses the claim.
    async fn on_location_ruined(
        &self,
        world_id: WorldId,
        location_id: LocationId,
        hop_count: u8,
    ) -> Result<(), ModuleError> {
        let factions = self.store.list_factions(world_id).await?;
        for faction in factions {
            if faction.held_locations.contains(&location_id) {
                info!(
                    faction_id = %faction.id,
                    location_id = %location_id,
                    hop_count,
                    "faction loses ruined location"
                );
                self.release_location_at(faction.id, location_id, hop_count, "Lost ruined")
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

    use chronicle_types::LocationStatusChanged;

    use super::*;
    use crate::memory::MemoryFactionStore;

    fn module() -> (
        Arc<FactionReactor<Arc<MemoryFactionStore>>>,
        Arc<MemoryFactionStore>,
        Arc<EventBus>,
    ) {
        let store = Arc::new(MemoryFactionStore::new());
        let bus = Arc::new(EventBus::default());
        let module = Arc::new(FactionReactor::new(Arc::clone(&store), Arc::clone(&bus)));
        (module, store, bus)
    }

    #[tokio::test]
    async fn claim_is_idempotent() {
        let (module, store, _) = module();
        let world_id = WorldId::new();
        let faction = module
            .create_faction(world_id, "Iron Pact", "Control the river trade")
            .await
            .unwrap();
        let location_id = LocationId::new();

        module.claim_location(faction.id, location_id).await.unwrap();
        module.claim_location(faction.id, location_id).await.unwrap();

        let stored = store.get_faction(faction.id).await.unwrap();
        assert_eq!(stored.held_locations, vec![location_id]);
        // One founding entry plus one claim entry; the duplicate claim
        // appended nothing.
        assert_eq!(store.history(faction.id).len(), 2);
    }

    #[tokio::test]
    async fn releasing_unheld_location_is_noop() {
        let (module, _, bus) = module();
        let world_id = WorldId::new();
        let faction = module
            .create_faction(world_id, "Iron Pact", "Control the river trade")
            .await
            .unwrap();

        let published = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&published);
        bus.subscribe(Topic::FactionLostLocation, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        });

        module
            .release_location(faction.id, LocationId::new())
            .await
            .unwrap();
        assert_eq!(published.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_change_publishes_once() {
        let (module, _, bus) = module();
        let world_id = WorldId::new();
        let faction = module
            .create_faction(world_id, "Iron Pact", "Control the river trade")
            .await
            .unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        bus.subscribe(Topic::FactionStatusChanged, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                if let TopicPayload::FactionStatusChanged(p) = envelope.payload {
                    sink.lock().unwrap().push((p.previous_status, p.new_status));
                }
                Ok(())
            }
        });

        module
            .set_status(faction.id, FactionStatus::Rising)
            .await
            .unwrap();
        module
            .set_status(faction.id, FactionStatus::Rising)
            .await
            .unwrap();

        assert_eq!(
            *changes.lock().unwrap(),
            vec![(FactionStatus::Stable, FactionStatus::Rising)]
        );
    }

    #[tokio::test]
    async fn ruined_location_is_released_with_incremented_hop() {
        let (module, store, bus) = module();
        module.attach(&bus);
        let world_id = WorldId::new();
        let faction = module
            .create_faction(world_id, "Iron Pact", "Control the river trade")
            .await
            .unwrap();
        let location_id = LocationId::new();
        module.claim_location(faction.id, location_id).await.unwrap();

        let losses = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&losses);
        bus.subscribe(Topic::FactionLostLocation, move |envelope| {
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
        // Duplicate delivery: the claim is already gone, nothing republishes.
        bus.publish(ruin, 0).await.unwrap();

        assert_eq!(*losses.lock().unwrap(), vec![1]);
        let stored = store.get_faction(faction.id).await.unwrap();
        assert!(stored.held_locations.is_empty());
    }
}
