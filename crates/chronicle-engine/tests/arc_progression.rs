//! Full arc progression driven through the bus.
//!
//! Exercises the engine end to end with the stub generation source and the
//! in-memory store: arc creation seeds the three anchors with the pointer
//! on the opening beat, every third severe event produces exactly one
//! dynamic beat, and filling the fifteenth slot completes the arc with one
//! summary and a cleared world pointer.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chronicle_bus::EventBus;
use chronicle_engine::aggregator::EventAggregator;
use chronicle_engine::lifecycle::ArcLifecycle;
use chronicle_engine::ports::NarrativeStore;
use chronicle_engine::stub::{MemoryStore, StubGeneration};
use chronicle_types::{
    ArcStatus, BeatType, EventCategory, ImpactLevel, Topic, TopicPayload, WorldId,
};

struct Harness {
    lifecycle: Arc<ArcLifecycle<Arc<StubGeneration>, Arc<MemoryStore>>>,
    aggregator: Arc<EventAggregator<Arc<StubGeneration>, Arc<MemoryStore>>>,
    generation: Arc<StubGeneration>,
    store: Arc<MemoryStore>,
    bus: Arc<EventBus>,
    world_id: WorldId,
}

fn harness() -> Harness {
    let generation = Arc::new(StubGeneration::new());
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let world_id = store.seed_world("Aldmere");
    let lifecycle = Arc::new(ArcLifecycle::new(
        Arc::clone(&generation),
        Arc::clone(&store),
        Arc::clone(&bus),
    ));
    let aggregator = Arc::new(EventAggregator::new(Arc::clone(&lifecycle), 3));
    aggregator.attach(&bus);
    Harness {
        lifecycle,
        aggregator,
        generation,
        store,
        bus,
        world_id,
    }
}

/// Record one severe event through the lifecycle; the publish fans out to
/// the aggregator synchronously.
async fn severe_event(h: &Harness, description: &str) {
    h.lifecycle
        .record_event(
            h.world_id,
            ImpactLevel::Major,
            EventCategory::PlayerAction,
            description,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn arc_runs_from_creation_to_completion() {
    let h = harness();

    let beat_indices = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(Vec::new()));
    {
        let sink = Arc::clone(&beat_indices);
        h.bus.subscribe(Topic::BeatCreated, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                if let TopicPayload::BeatCreated(payload) = envelope.payload {
                    sink.lock().unwrap().push(payload.beat_index);
                }
                Ok(())
            }
        });
    }
    {
        let sink = Arc::clone(&completions);
        h.bus.subscribe(Topic::ArcCompleted, move |envelope| {
            let sink = Arc::clone(&sink);
            async move {
                if let TopicPayload::ArcCompleted(payload) = envelope.payload {
                    sink.lock().unwrap().push(payload.summary);
                }
                Ok(())
            }
        });
    }

    // Arc creation: three anchors, pointer on the opening beat.
    let arc = h.lifecycle.create_arc(h.world_id).await.unwrap();
    let anchors = h.store.get_arc_beats(arc.id).await.unwrap();
    assert_eq!(anchors.len(), 3);
    assert!(anchors.iter().all(|b| b.beat_type == BeatType::Anchor));
    let opening = anchors.iter().find(|b| b.beat_index == 0).unwrap();
    assert_eq!(arc.current_beat_id, Some(opening.id));

    // Twelve dynamic slots; each fills after exactly three severe events.
    for round in 0_u32..12 {
        severe_event(&h, "Something severe happened.").await;
        severe_event(&h, "It worsened.").await;
        assert_eq!(h.generation.beat_calls(), round);

        severe_event(&h, "The third blow landed.").await;
        assert_eq!(h.generation.beat_calls(), round + 1);
        assert_eq!(h.aggregator.pending_count(h.world_id), 0);
    }

    // Beats published once each, in slot order around the anchors.
    assert_eq!(
        *beat_indices.lock().unwrap(),
        vec![1, 2, 3, 4, 5, 6, 8, 9, 10, 11, 12, 13]
    );

    // Filling slot 13 (the fifteenth beat overall) completed the arc.
    let completed = h.store.get_arc(arc.id).await.unwrap();
    assert_eq!(completed.status, ArcStatus::Completed);
    assert!(completed.summary.is_some());
    assert!(completed.completed_at.is_some());
    assert_eq!(h.generation.summary_calls(), 1);
    assert_eq!(completions.lock().unwrap().len(), 1);

    let world = h.store.get_world(h.world_id).await.unwrap();
    assert_eq!(world.current_arc_id, None);

    // All fifteen slots populated exactly once.
    let beats = h.store.get_arc_beats(arc.id).await.unwrap();
    let indices: Vec<u8> = beats.iter().map(|b| b.beat_index).collect();
    assert_eq!(indices, (0..15).collect::<Vec<u8>>());
}

#[tokio::test]
async fn severe_events_after_completion_start_a_new_arc() {
    let h = harness();
    h.lifecycle.create_arc(h.world_id).await.unwrap();

    for _ in 0..36 {
        severe_event(&h, "Relentless catastrophe.").await;
    }

    // First arc done; the next threshold crossing created arc two.
    for _ in 0..3 {
        severe_event(&h, "A new age dawns.").await;
    }

    let world = h.store.get_world(h.world_id).await.unwrap();
    let second_arc_id = world.current_arc_id.unwrap();
    let second = h.store.get_arc(second_arc_id).await.unwrap();
    assert_eq!(second.arc_number, 2);
    assert_eq!(second.status, ArcStatus::Active);

    // Second arc holds its anchors plus one dynamic beat.
    let beats = h.store.get_arc_beats(second_arc_id).await.unwrap();
    assert_eq!(beats.len(), 4);
    assert_eq!(h.generation.summary_calls(), 1);
    assert_eq!(h.generation.anchor_calls(), 2);
}
