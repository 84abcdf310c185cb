//! `PostgreSQL` implementation of the engine's narrative store.
//!
//! Two operations carry an atomicity contract and are wrapped in
//! transactions: the anchor batch at arc creation (arc row, three anchor
//! rows, world pointer -- all or nothing) and a beat insert together with
//! its current-pointer update. Everything else is single-statement.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use chronicle_engine::ports::{NarrativeStore, StoreError};
use chronicle_types::{
    ArcId, BeatId, Character, CharacterId, Faction, FactionId, Location, LocationId, NarrativeArc,
    StoryBeat, World, WorldEvent, WorldEventId, WorldId,
};

use crate::codec;
use crate::error::DbError;

/// Narrative persistence over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgNarrativeStore {
    pool: PgPool,
}

impl PgNarrativeStore {
    /// Create a store over a connection pool. The pool is internally
    /// reference-counted, so cloning the handle is cheap.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a world row. Used at bootstrap; the engine itself never
    /// creates worlds.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the insert fails.
    pub async fn insert_world(&self, world: &World) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO worlds (id, name, current_arc_id, created_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(world.id.into_inner())
        .bind(&world.name)
        .bind(world.current_arc_id.map(ArcId::into_inner))
        .bind(world.created_at)
        .execute(&self.pool)
        .await
        .map_err(pg)?;
        Ok(())
    }

    /// Find a world by name. Used at bootstrap to resume an existing run.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the query fails.
    pub async fn find_world_by_name(&self, name: &str) -> Result<Option<World>, StoreError> {
        let row = sqlx::query_as::<_, WorldRow>(
            r"SELECT id, name, current_arc_id, created_at FROM worlds WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;
        Ok(row.map(World::from))
    }
}

fn pg(e: sqlx::Error) -> StoreError {
    StoreError::from(DbError::Postgres(e))
}

/// A row from the `worlds` table.
#[derive(Debug, sqlx::FromRow)]
struct WorldRow {
    id: Uuid,
    name: String,
    current_arc_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<WorldRow> for World {
    fn from(row: WorldRow) -> Self {
        Self {
            id: WorldId::from(row.id),
            name: row.name,
            current_arc_id: row.current_arc_id.map(ArcId::from),
            created_at: row.created_at,
        }
    }
}

/// A row from the `narrative_arcs` table.
#[derive(Debug, sqlx::FromRow)]
struct ArcRow {
    id: Uuid,
    world_id: Uuid,
    arc_number: i32,
    status: String,
    current_beat_id: Option<Uuid>,
    summary: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ArcRow> for NarrativeArc {
    type Error = DbError;

    fn try_from(row: ArcRow) -> Result<Self, DbError> {
        Ok(Self {
            id: ArcId::from(row.id),
            world_id: WorldId::from(row.world_id),
            arc_number: u32::try_from(row.arc_number).unwrap_or(0),
            status: codec::arc_status_from_db(&row.status)?,
            current_beat_id: row.current_beat_id.map(BeatId::from),
            summary: row.summary,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row from the `story_beats` table.
#[derive(Debug, sqlx::FromRow)]
struct BeatRow {
    id: Uuid,
    arc_id: Uuid,
    beat_index: i16,
    beat_type: String,
    name: String,
    description: String,
    directives: Vec<String>,
    emergent: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BeatRow> for StoryBeat {
    type Error = DbError;

    fn try_from(row: BeatRow) -> Result<Self, DbError> {
        Ok(Self {
            id: BeatId::from(row.id),
            arc_id: ArcId::from(row.arc_id),
            beat_index: u8::try_from(row.beat_index)
                .map_err(|_| DbError::Decode(format!("beat index out of range: {}", row.beat_index)))?,
            beat_type: codec::beat_type_from_db(&row.beat_type)?,
            name: row.name,
            description: row.description,
            directives: row.directives,
            emergent: row.emergent,
            created_at: row.created_at,
        })
    }
}

/// A row from the `world_events` table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    world_id: Uuid,
    arc_id: Option<Uuid>,
    beat_id: Option<Uuid>,
    impact: String,
    category: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for WorldEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, DbError> {
        Ok(Self {
            id: WorldEventId::from(row.id),
            world_id: WorldId::from(row.world_id),
            arc_id: row.arc_id.map(ArcId::from),
            beat_id: row.beat_id.map(BeatId::from),
            impact: codec::impact_from_db(&row.impact)?,
            category: codec::category_from_db(&row.category)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// A row from the `factions` table.
#[derive(Debug, sqlx::FromRow)]
struct FactionRow {
    id: Uuid,
    world_id: Uuid,
    name: String,
    status: String,
    agenda: String,
    held_locations: Vec<Uuid>,
}

impl TryFrom<FactionRow> for Faction {
    type Error = DbError;

    fn try_from(row: FactionRow) -> Result<Self, DbError> {
        Ok(Self {
            id: FactionId::from(row.id),
            world_id: WorldId::from(row.world_id),
            name: row.name,
            status: codec::faction_status_from_db(&row.status)?,
            agenda: row.agenda,
            held_locations: row.held_locations.into_iter().map(LocationId::from).collect(),
        })
    }
}

/// A row from the `characters` table.
#[derive(Debug, sqlx::FromRow)]
struct CharacterRow {
    id: Uuid,
    world_id: Uuid,
    name: String,
    status: String,
    faction_id: Option<Uuid>,
    location_id: Option<Uuid>,
}

impl TryFrom<CharacterRow> for Character {
    type Error = DbError;

    fn try_from(row: CharacterRow) -> Result<Self, DbError> {
        Ok(Self {
            id: CharacterId::from(row.id),
            world_id: WorldId::from(row.world_id),
            name: row.name,
            status: codec::character_status_from_db(&row.status)?,
            faction_id: row.faction_id.map(FactionId::from),
            location_id: row.location_id.map(LocationId::from),
        })
    }
}

/// A row from the `locations` table.
#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    world_id: Uuid,
    name: String,
    status: String,
    controlled_by: Option<Uuid>,
}

impl TryFrom<LocationRow> for Location {
    type Error = DbError;

    fn try_from(row: LocationRow) -> Result<Self, DbError> {
        Ok(Self {
            id: LocationId::from(row.id),
            world_id: WorldId::from(row.world_id),
            name: row.name,
            status: codec::location_status_from_db(&row.status)?,
            controlled_by: row.controlled_by.map(FactionId::from),
        })
    }
}

impl NarrativeStore for PgNarrativeStore {
    async fn get_world(&self, world_id: WorldId) -> Result<World, StoreError> {
        let row = sqlx::query_as::<_, WorldRow>(
            r"SELECT id, name, current_arc_id, created_at FROM worlds WHERE id = $1",
        )
        .bind(world_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;

        row.map(World::from).ok_or(StoreError::NotFound {
            entity: "world",
            id: world_id.to_string(),
        })
    }

    async fn next_arc_number(&self, world_id: WorldId) -> Result<u32, StoreError> {
        let max: i32 = sqlx::query_scalar(
            r"SELECT COALESCE(MAX(arc_number), 0) FROM narrative_arcs WHERE world_id = $1",
        )
        .bind(world_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(pg)?;

        Ok(u32::try_from(max).unwrap_or(0).saturating_add(1))
    }

    async fn create_arc_with_anchors(
        &self,
        arc: &NarrativeArc,
        anchors: &[StoryBeat],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg)?;

        sqlx::query(
            r"INSERT INTO narrative_arcs
              (id, world_id, arc_number, status, current_beat_id, summary, created_at, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(arc.id.into_inner())
        .bind(arc.world_id.into_inner())
        .bind(i32::try_from(arc.arc_number).unwrap_or(i32::MAX))
        .bind(codec::arc_status_to_db(arc.status))
        .bind(arc.current_beat_id.map(BeatId::into_inner))
        .bind(arc.summary.as_deref())
        .bind(arc.created_at)
        .bind(arc.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(pg)?;

        // Three rows at most; per-row inserts inside the transaction keep
        // the batch atomic without an UNNEST over nested text arrays.
        for beat in anchors {
            sqlx::query(
                r"INSERT INTO story_beats
                  (id, arc_id, beat_index, beat_type, name, description, directives, emergent, created_at)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(beat.id.into_inner())
            .bind(beat.arc_id.into_inner())
            .bind(i16::from(beat.beat_index))
            .bind(codec::beat_type_to_db(beat.beat_type))
            .bind(&beat.name)
            .bind(&beat.description)
            .bind(&beat.directives)
            .bind(&beat.emergent)
            .bind(beat.created_at)
            .execute(&mut *tx)
            .await
            .map_err(pg)?;
        }

        sqlx::query(r"UPDATE worlds SET current_arc_id = $1 WHERE id = $2")
            .bind(arc.id.into_inner())
            .bind(arc.world_id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(pg)?;

        tx.commit().await.map_err(pg)?;

        tracing::debug!(
            arc_id = %arc.id,
            anchors = anchors.len(),
            "Inserted arc with anchor batch"
        );
        Ok(())
    }

    async fn get_arc(&self, arc_id: ArcId) -> Result<NarrativeArc, StoreError> {
        let row = sqlx::query_as::<_, ArcRow>(
            r"SELECT id, world_id, arc_number, status, current_beat_id, summary, created_at, completed_at
              FROM narrative_arcs WHERE id = $1",
        )
        .bind(arc_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound {
                entity: "arc",
                id: arc_id.to_string(),
            });
        };
        Ok(NarrativeArc::try_from(row)?)
    }

    async fn get_arc_beats(&self, arc_id: ArcId) -> Result<Vec<StoryBeat>, StoreError> {
        let rows = sqlx::query_as::<_, BeatRow>(
            r"SELECT id, arc_id, beat_index, beat_type, name, description, directives, emergent, created_at
              FROM story_beats WHERE arc_id = $1 ORDER BY beat_index",
        )
        .bind(arc_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| StoryBeat::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn create_beat(&self, beat: &StoryBeat, move_pointer: bool) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg)?;

        sqlx::query(
            r"INSERT INTO story_beats
              (id, arc_id, beat_index, beat_type, name, description, directives, emergent, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(beat.id.into_inner())
        .bind(beat.arc_id.into_inner())
        .bind(i16::from(beat.beat_index))
        .bind(codec::beat_type_to_db(beat.beat_type))
        .bind(&beat.name)
        .bind(&beat.description)
        .bind(&beat.directives)
        .bind(&beat.emergent)
        .bind(beat.created_at)
        .execute(&mut *tx)
        .await
        .map_err(pg)?;

        if move_pointer {
            sqlx::query(r"UPDATE narrative_arcs SET current_beat_id = $1 WHERE id = $2")
                .bind(beat.id.into_inner())
                .bind(beat.arc_id.into_inner())
                .execute(&mut *tx)
                .await
                .map_err(pg)?;
        }

        tx.commit().await.map_err(pg)
    }

    async fn create_event(&self, event: &WorldEvent) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO world_events
              (id, world_id, arc_id, beat_id, impact, category, description, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id.into_inner())
        .bind(event.world_id.into_inner())
        .bind(event.arc_id.map(ArcId::into_inner))
        .bind(event.beat_id.map(BeatId::into_inner))
        .bind(codec::impact_to_db(event.impact))
        .bind(codec::category_to_db(event.category))
        .bind(&event.description)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(pg)?;
        Ok(())
    }

    async fn get_events_since(
        &self,
        world_id: WorldId,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<WorldEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, world_id, arc_id, beat_id, impact, category, description, created_at
              FROM world_events
              WHERE world_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR created_at > $2)
              ORDER BY created_at DESC
              LIMIT $3",
        )
        .bind(world_id.into_inner())
        .bind(since)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        // Query is newest-first for the LIMIT; callers want oldest-first.
        rows.into_iter()
            .rev()
            .map(|row| WorldEvent::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn complete_arc(
        &self,
        arc_id: ArcId,
        summary: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg)?;

        let updated = sqlx::query(
            r"UPDATE narrative_arcs
              SET status = 'completed', summary = $2, completed_at = $3
              WHERE id = $1 AND status = 'active'",
        )
        .bind(arc_id.into_inner())
        .bind(summary)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(pg)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "arc {arc_id} is not active"
            )));
        }

        sqlx::query(r"UPDATE worlds SET current_arc_id = NULL WHERE current_arc_id = $1")
            .bind(arc_id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(pg)?;

        tx.commit().await.map_err(pg)
    }

    async fn list_factions(&self, world_id: WorldId) -> Result<Vec<Faction>, StoreError> {
        let rows = sqlx::query_as::<_, FactionRow>(
            r"SELECT id, world_id, name, status, agenda, held_locations
              FROM factions WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Faction::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_characters(&self, world_id: WorldId) -> Result<Vec<Character>, StoreError> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            r"SELECT id, world_id, name, status, faction_id, location_id
              FROM characters WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Character::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_locations(&self, world_id: WorldId) -> Result<Vec<Location>, StoreError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r"SELECT id, world_id, name, status, controlled_by
              FROM locations WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Location::try_from(row).map_err(StoreError::from))
            .collect()
    }
}
