//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the narrative engine has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing.
//!
//! `PostgreSQL` generates IDs via `DEFAULT uuidv7()` for inserts. The `new()`
//! constructors here exist for app-side generation (tests, seed data, and
//! entities created before their first persistence round-trip).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a world.
    WorldId
}

define_id! {
    /// Unique identifier for a narrative arc within a world.
    ArcId
}

define_id! {
    /// Unique identifier for a story beat within an arc.
    BeatId
}

define_id! {
    /// Unique identifier for a persisted world event.
    WorldEventId
}

define_id! {
    /// Unique identifier for a faction.
    FactionId
}

define_id! {
    /// Unique identifier for a character.
    CharacterId
}

define_id! {
    /// Unique identifier for a location.
    LocationId
}
