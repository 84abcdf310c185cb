//! Cross-module choreography over one bus.
//!
//! Wires all three reactive modules together and drives the ruin cascade:
//! a location falls to ruin, the faction holding it releases its claim, the
//! location clears its controller, and resident characters go missing. Each
//! reactive hop carries an incremented hop count and the cascade terminates
//! well inside the bus's hop ceiling.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chronicle_bus::EventBus;
use chronicle_reactors::memory::{
    MemoryCharacterStore, MemoryFactionStore, MemoryLocationStore,
};
use chronicle_reactors::store::{CharacterStore, FactionStore, LocationStore};
use chronicle_reactors::{CharacterReactor, FactionReactor, LocationReactor};
use chronicle_types::{
    Character, CharacterStatus, Location, LocationStatus, Topic, WorldId,
};

struct Harness {
    factions: Arc<FactionReactor<Arc<MemoryFactionStore>>>,
    locations: Arc<LocationReactor<Arc<MemoryLocationStore>>>,
    faction_store: Arc<MemoryFactionStore>,
    character_store: Arc<MemoryCharacterStore>,
    location_store: Arc<MemoryLocationStore>,
    bus: Arc<EventBus>,
    world_id: WorldId,
}

fn harness() -> Harness {
    let bus = Arc::new(EventBus::default());
    let faction_store = Arc::new(MemoryFactionStore::new());
    let character_store = Arc::new(MemoryCharacterStore::new());
    let location_store = Arc::new(MemoryLocationStore::new());

    let factions = Arc::new(FactionReactor::new(
        Arc::clone(&faction_store),
        Arc::clone(&bus),
    ));
    let characters = Arc::new(CharacterReactor::new(
        Arc::clone(&character_store),
        Arc::clone(&bus),
    ));
    let locations = Arc::new(LocationReactor::new(
        Arc::clone(&location_store),
        Arc::clone(&bus),
    ));
    factions.attach(&bus);
    characters.attach(&bus);
    locations.attach(&bus);

    Harness {
        factions,
        locations,
        faction_store,
        character_store,
        location_store,
        bus,
        world_id: WorldId::new(),
    }
}

#[tokio::test]
async fn ruin_cascade_ripples_through_all_modules() {
    let h = harness();

    let location = Location {
        id: chronicle_types::LocationId::new(),
        world_id: h.world_id,
        name: String::from("Karth Bridge"),
        status: LocationStatus::Stable,
        controlled_by: None,
    };
    h.location_store.seed(location.clone());

    let faction = h
        .factions
        .create_faction(h.world_id, "Iron Pact", "Control the river trade")
        .await
        .unwrap();
    h.factions
        .claim_location(faction.id, location.id)
        .await
        .unwrap();

    let resident = Character {
        id: chronicle_types::CharacterId::new(),
        world_id: h.world_id,
        name: String::from("Maren"),
        status: CharacterStatus::Active,
        faction_id: Some(faction.id),
        location_id: Some(location.id),
    };
    h.character_store.seed(resident.clone());

    // Observe every reactive hop on the cascade's topics.
    let hops = Arc::new(Mutex::new(Vec::new()));
    for topic in [
        Topic::LocationStatusChanged,
        Topic::FactionLostLocation,
        Topic::CharacterStatusChanged,
    ] {
        let sink = Arc::clone(&hops);
        h.bus.subscribe(topic, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((envelope.topic, envelope.hop_count));
                Ok(())
            }
        });
    }

    h.locations
        .set_status(location.id, LocationStatus::Ruined)
        .await
        .unwrap();

    // The faction released its claim; the location lost its controller;
    // the resident went missing.
    let stored_faction = h.faction_store.get_faction(faction.id).await.unwrap();
    assert!(stored_faction.held_locations.is_empty());

    let stored_location = h.location_store.get_location(location.id).await.unwrap();
    assert_eq!(stored_location.controlled_by, None);
    assert_eq!(stored_location.status, LocationStatus::Ruined);

    let stored_resident = h.character_store.get_character(resident.id).await.unwrap();
    assert_eq!(stored_resident.status, CharacterStatus::Missing);

    // Root publish at hop 0; every reaction carried hop 1; the cascade
    // terminated without approaching the ceiling.
    let observed = hops.lock().unwrap().clone();
    assert!(observed.contains(&(Topic::LocationStatusChanged, 0)));
    assert!(observed.contains(&(Topic::FactionLostLocation, 1)));
    assert!(observed.contains(&(Topic::CharacterStatusChanged, 1)));
    assert!(observed.iter().all(|(_, hop)| *hop <= 1));

    // Replaying the cascade is harmless: everything already settled.
    h.locations
        .set_status(location.id, LocationStatus::Ruined)
        .await
        .unwrap();
    let replay = hops.lock().unwrap().clone();
    assert_eq!(replay.len(), observed.len());
}
