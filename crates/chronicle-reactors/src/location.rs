//! The location module.
//!
//! Owns location entities: condition, controlling faction, and the location
//! history log. Reacts to `faction.took_location` and
//! `faction.lost_location` by updating the controller field; a takeover of
//! an already-controlled location marks it contested and republishes the
//! condition change with the incremented hop count. Clearing control of an
//! already-unclaimed location is a no-op.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chronicle_bus::{EventBus, SubscriptionId};
use chronicle_types::{
    FactionId, LocationId, LocationStatus, LocationStatusChanged, Topic, TopicPayload,
};

use crate::error::ModuleError;
use crate::store::LocationStore;

/// The location reactive module.
pub struct LocationReactor<S> {
    store: S,
    bus: Arc<EventBus>,
}

impl<S> LocationReactor<S>
where
    S: LocationStore + 'static,
{
    /// Create the module over its store and the shared bus.
    pub const fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Subscribe to the topics this module reacts to.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        let took = {
            let module = Arc::clone(self);
            bus.subscribe(Topic::FactionTookLocation, move |envelope| {
                let module = Arc::clone(&module);
                async move {
                    let hop = envelope.next_hop();
                    if let TopicPayload::FactionTookLocation(payload) = envelope.payload {
                        if let Err(e) = module
                            .on_taken(payload.location_id, payload.faction_id, hop)
                            .await
                        {
                            warn!(
                                location_id = %payload.location_id,
                                error = %e,
                                "location reaction to takeover skipped"
                            );
                        }
                    }
                    Ok(())
                }
            })
        };
        let lost = {
            let module = Arc::clone(self);
            bus.subscribe(Topic::FactionLostLocation, move |envelope| {
                let module = Arc::clone(&module);
                async move {
                    if let TopicPayload::FactionLostLocation(payload) = envelope.payload {
                        if let Err(e) = module
                            .on_lost(payload.location_id, payload.faction_id)
                            .await
                        {
                            warn!(
                                location_id = %payload.location_id,
                                error = %e,
                                "location reaction to lost claim skipped"
                            );
                        }
                    }
                    Ok(())
                }
            })
        };
        vec![took, lost]
    }

    /// Change a location's condition. Setting the current condition again
    /// is a no-op and publishes nothing.
    pub async fn set_status(
        &self,
        location_id: LocationId,
        new_status: LocationStatus,
    ) -> Result<(), ModuleError> {
        self.set_status_at(location_id, new_status, 0).await
    }

    async fn set_status_at(
        &self,
        location_id: LocationId,
        new_status: LocationStatus,
        hop_count: u8,
    ) -> Result<(), ModuleError> {
        let mut location = self.store.get_location(location_id).await?;
        if location.status == new_status {
            debug!(location_id = %location_id, "location condition unchanged, skipping");
            return Ok(());
        }
        let previous_status = location.status;
        location.status = new_status;
        self.store.update_location(&location).await?;
        self.store
            .append_location_history(
                location_id,
                &format!("Condition shifted from {previous_status:?} to {new_status:?}."),
            )
            .await?;

        self.bus
            .publish(
                TopicPayload::LocationStatusChanged(LocationStatusChanged {
                    world_id: location.world_id,
                    location_id,
                    previous_status,
                    new_status,
                }),
                hop_count,
            )
            .await?;

        info!(
            location_id = %location_id,
            ?previous_status,
            ?new_status,
            hop_count,
            "location condition changed"
        );
        Ok(())
    }

    /// A faction took the location. A contested takeover (someone else
    /// already controlled it) also marks the location contested.
    async fn on_taken(
        &self,
        location_id: LocationId,
        faction_id: FactionId,
        hop_count: u8,
    ) -> Result<(), ModuleError> {
        let mut location = self.store.get_location(location_id).await?;
        if location.controlled_by == Some(faction_id) {
            debug!(location_id = %location_id, "controller unchanged, skipping");
            return Ok(());
        }
        let contested = location.controlled_by.is_some();
        location.controlled_by = Some(faction_id);
        self.store.update_location(&location).await?;
        self.store
            .append_location_history(
                location_id,
                &format!("Control passed to faction {faction_id}."),
            )
            .await?;

        if contested {
            self.set_status_at(location_id, LocationStatus::Contested, hop_count)
                .await?;
        }
        Ok(())
    }

    /// A faction lost its claim. If it was the controller, control clears;
    /// an already-unclaimed location is left alone.
    async fn on_lost(
        &self,
        location_id: LocationId,
        faction_id: FactionId,
    ) -> Result<(), ModuleError> {
        let mut location = self.store.get_location(location_id).await?;
        if location.controlled_by != Some(faction_id) {
            debug!(location_id = %location_id, "claimant was not controller, skipping");
            return Ok(());
        }
        location.controlled_by = None;
        self.store.update_location(&location).await?;
        self.store
            .append_location_history(
                location_id,
                &format!("Faction {faction_id} no longer controls this place."),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chronicle_types::{FactionLostLocation, FactionTookLocation, Location, WorldId};

    use super::*;
    use crate::memory::MemoryLocationStore;

    fn module() -> (
        Arc<LocationReactor<Arc<MemoryLocationStore>>>,
        Arc<MemoryLocationStore>,
        Arc<EventBus>,
        LocationId,
        WorldId,
    ) {
        let store = Arc::new(MemoryLocationStore::new());
        let bus = Arc::new(EventBus::default());
        let world_id = WorldId::new();
        let location_id = LocationId::new();
        store.seed(Location {
            id: location_id,
            world_id,
            name: String::from("Karth Bridge"),
            status: LocationStatus::Stable,
            controlled_by: None,
        });
        let module = Arc::new(LocationReactor::new(Arc::clone(&store), Arc::clone(&bus)));
        module.attach(&bus);
        (module, store, bus, location_id, world_id)
    }

    #[tokio::test]
    async fn takeover_of_unclaimed_location_sets_controller_quietly() {
        let (_, store, bus, location_id, world_id) = module();
        let faction_id = FactionId::new();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        bus.subscribe(Topic::LocationStatusChanged, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(envelope.hop_count);
                Ok(())
            }
        });

        bus.publish(
            TopicPayload::FactionTookLocation(FactionTookLocation {
                world_id,
                faction_id,
                location_id,
            }),
            0,
        )
        .await
        .unwrap();

        let stored = store.get_location(location_id).await.unwrap();
        assert_eq!(stored.controlled_by, Some(faction_id));
        assert_eq!(stored.status, LocationStatus::Stable);
        assert!(changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn contested_takeover_republishes_with_incremented_hop() {
        let (_, store, bus, location_id, world_id) = module();
        let first = FactionId::new();
        let second = FactionId::new();

        let hops = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hops);
        bus.subscribe(Topic::LocationStatusChanged, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(envelope.hop_count);
                Ok(())
            }
        });

        for faction_id in [first, second] {
            bus.publish(
                TopicPayload::FactionTookLocation(FactionTookLocation {
                    world_id,
                    faction_id,
                    location_id,
                }),
                0,
            )
            .await
            .unwrap();
        }

        let stored = store.get_location(location_id).await.unwrap();
        assert_eq!(stored.controlled_by, Some(second));
        assert_eq!(stored.status, LocationStatus::Contested);
        assert_eq!(*hops.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn losing_an_unclaimed_location_is_noop() {
        let (_, store, bus, location_id, world_id) = module();

        bus.publish(
            TopicPayload::FactionLostLocation(FactionLostLocation {
                world_id,
                faction_id: FactionId::new(),
                location_id,
            }),
            0,
        )
        .await
        .unwrap();

        let stored = store.get_location(location_id).await.unwrap();
        assert_eq!(stored.controlled_by, None);
        assert!(store.history(location_id).is_empty());
    }

    #[tokio::test]
    async fn set_status_is_idempotent() {
        let (module, store, _, location_id, _) = module();

        module
            .set_status(location_id, LocationStatus::Declining)
            .await
            .unwrap();
        module
            .set_status(location_id, LocationStatus::Declining)
            .await
            .unwrap();

        assert_eq!(store.history(location_id).len(), 1);
    }
}
