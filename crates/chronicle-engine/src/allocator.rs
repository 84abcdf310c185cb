//! Beat allocation: pure index math over an arc's existing beats.
//!
//! Every arc has 15 beat slots. Anchors occupy indices 0, 7, and 14 from
//! creation; dynamic beats fill the remaining indices one at a time, in
//! ascending order. The functions here decide which slot comes next and
//! whether an insert should move the arc's current-beat pointer. They are
//! pure and never suspend.

use chronicle_types::{BeatType, StoryBeat};

/// Number of beat slots in a complete arc.
pub const BEATS_PER_ARC: u8 = 15;

/// The fixed indices at which anchors exist, in ascending order.
pub const ANCHOR_INDICES: [u8; 3] = [0, 7, 14];

/// Errors from beat allocation. Both signal data-consistency bugs upstream
/// rather than recoverable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    /// All 15 slots are populated; the caller should have routed to arc
    /// completion instead of asking for another index.
    #[error("arc already has all {BEATS_PER_ARC} beats")]
    ArcFull,

    /// No anchor exists beyond the given index. Anchors are created
    /// together at arc start, so this occurring means the beat data is
    /// corrupt.
    #[error("no next anchor point found after index {after}")]
    NoNextAnchor {
        /// The index the search started after.
        after: u8,
    },
}

/// Whether the given index is one of the three fixed anchor slots.
pub fn is_anchor_index(index: u8) -> bool {
    ANCHOR_INDICES.contains(&index)
}

/// The next beat index to fill: the lowest index in `0..15` with no
/// existing beat.
///
/// # Errors
///
/// Returns [`AllocatorError::ArcFull`] if every slot is populated.
pub fn next_beat_index(beats: &[StoryBeat]) -> Result<u8, AllocatorError> {
    (0..BEATS_PER_ARC)
        .find(|index| !beats.iter().any(|beat| beat.beat_index == *index))
        .ok_or(AllocatorError::ArcFull)
}

/// The lowest-indexed anchor beat with `beat_index > after`.
///
/// # Errors
///
/// Returns [`AllocatorError::NoNextAnchor`] if no such anchor exists.
pub fn next_anchor(beats: &[StoryBeat], after: u8) -> Result<&StoryBeat, AllocatorError> {
    beats
        .iter()
        .filter(|beat| beat.beat_type == BeatType::Anchor && beat.beat_index > after)
        .min_by_key(|beat| beat.beat_index)
        .ok_or(AllocatorError::NoNextAnchor { after })
}

/// Whether inserting a beat of this type at this index moves the arc's
/// current-beat pointer.
///
/// Dynamic beats always move the pointer. Of the anchors, only index 0
/// does: when the initial anchor batch lands, the pointer must stay on
/// the opening beat rather than jump ahead to a future anchor at 7 or 14.
/// The store applies this atomically with the insert.
pub const fn moves_current_pointer(beat_type: BeatType, beat_index: u8) -> bool {
    match beat_type {
        BeatType::Dynamic => true,
        BeatType::Anchor => beat_index == 0,
    }
}
