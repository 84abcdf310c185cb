//! `PostgreSQL` implementations of the reactive modules' stores.
//!
//! One store per module, each over the same pool. History logs are
//! append-only side tables (`faction_history`, `character_history`,
//! `location_history`) with database-assigned sequence ids.

use sqlx::PgPool;
use uuid::Uuid;

use chronicle_reactors::store::{CharacterStore, FactionStore, LocationStore, ReactorError};
use chronicle_types::{
    Character, CharacterId, Faction, FactionId, Location, LocationId, WorldId,
};

use crate::codec;
use crate::error::DbError;

fn pg(e: sqlx::Error) -> ReactorError {
    ReactorError::from(DbError::Postgres(e))
}

/// Faction persistence over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgFactionStore {
    pool: PgPool,
}

impl PgFactionStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

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

impl FactionStore for PgFactionStore {
    async fn get_faction(&self, faction_id: FactionId) -> Result<Faction, ReactorError> {
        let row = sqlx::query_as::<_, FactionRow>(
            r"SELECT id, world_id, name, status, agenda, held_locations
              FROM factions WHERE id = $1",
        )
        .bind(faction_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;

        let Some(row) = row else {
            return Err(ReactorError::NotFound {
                entity: "faction",
                id: faction_id.to_string(),
            });
        };
        Ok(Faction::try_from(row)?)
    }

    async fn list_factions(&self, world_id: WorldId) -> Result<Vec<Faction>, ReactorError> {
        let rows = sqlx::query_as::<_, FactionRow>(
            r"SELECT id, world_id, name, status, agenda, held_locations
              FROM factions WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Faction::try_from(row).map_err(ReactorError::from))
            .collect()
    }

    async fn insert_faction(&self, faction: &Faction) -> Result<(), ReactorError> {
        sqlx::query(
            r"INSERT INTO factions (id, world_id, name, status, agenda, held_locations)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(faction.id.into_inner())
        .bind(faction.world_id.into_inner())
        .bind(&faction.name)
        .bind(codec::faction_status_to_db(faction.status))
        .bind(&faction.agenda)
        .bind(
            faction
                .held_locations
                .iter()
                .copied()
                .map(LocationId::into_inner)
                .collect::<Vec<Uuid>>(),
        )
        .execute(&self.pool)
        .await
        .map_err(pg)?;
        Ok(())
    }

    async fn update_faction(&self, faction: &Faction) -> Result<(), ReactorError> {
        let updated = sqlx::query(
            r"UPDATE factions SET name = $2, status = $3, agenda = $4, held_locations = $5
              WHERE id = $1",
        )
        .bind(faction.id.into_inner())
        .bind(&faction.name)
        .bind(codec::faction_status_to_db(faction.status))
        .bind(&faction.agenda)
        .bind(
            faction
                .held_locations
                .iter()
                .copied()
                .map(LocationId::into_inner)
                .collect::<Vec<Uuid>>(),
        )
        .execute(&self.pool)
        .await
        .map_err(pg)?;

        if updated.rows_affected() == 0 {
            return Err(ReactorError::NotFound {
                entity: "faction",
                id: faction.id.to_string(),
            });
        }
        Ok(())
    }

    async fn append_faction_history(
        &self,
        faction_id: FactionId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        sqlx::query(r"INSERT INTO faction_history (faction_id, entry) VALUES ($1, $2)")
            .bind(faction_id.into_inner())
            .bind(entry)
            .execute(&self.pool)
            .await
            .map_err(pg)?;
        Ok(())
    }
}

/// Character persistence over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgCharacterStore {
    pool: PgPool,
}

impl PgCharacterStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

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

impl CharacterStore for PgCharacterStore {
    async fn get_character(&self, character_id: CharacterId) -> Result<Character, ReactorError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            r"SELECT id, world_id, name, status, faction_id, location_id
              FROM characters WHERE id = $1",
        )
        .bind(character_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;

        let Some(row) = row else {
            return Err(ReactorError::NotFound {
                entity: "character",
                id: character_id.to_string(),
            });
        };
        Ok(Character::try_from(row)?)
    }

    async fn list_characters(&self, world_id: WorldId) -> Result<Vec<Character>, ReactorError> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            r"SELECT id, world_id, name, status, faction_id, location_id
              FROM characters WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Character::try_from(row).map_err(ReactorError::from))
            .collect()
    }

    async fn update_character(&self, character: &Character) -> Result<(), ReactorError> {
        let updated = sqlx::query(
            r"UPDATE characters SET name = $2, status = $3, faction_id = $4, location_id = $5
              WHERE id = $1",
        )
        .bind(character.id.into_inner())
        .bind(&character.name)
        .bind(codec::character_status_to_db(character.status))
        .bind(character.faction_id.map(FactionId::into_inner))
        .bind(character.location_id.map(LocationId::into_inner))
        .execute(&self.pool)
        .await
        .map_err(pg)?;

        if updated.rows_affected() == 0 {
            return Err(ReactorError::NotFound {
                entity: "character",
                id: character.id.to_string(),
            });
        }
        Ok(())
    }

    async fn append_character_history(
        &self,
        character_id: CharacterId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        sqlx::query(r"INSERT INTO character_history (character_id, entry) VALUES ($1, $2)")
            .bind(character_id.into_inner())
            .bind(entry)
            .execute(&self.pool)
            .await
            .map_err(pg)?;
        Ok(())
    }
}

/// Location persistence over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgLocationStore {
    pool: PgPool,
}

impl PgLocationStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

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

impl LocationStore for PgLocationStore {
    async fn get_location(&self, location_id: LocationId) -> Result<Location, ReactorError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r"SELECT id, world_id, name, status, controlled_by
              FROM locations WHERE id = $1",
        )
        .bind(location_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg)?;

        let Some(row) = row else {
            return Err(ReactorError::NotFound {
                entity: "location",
                id: location_id.to_string(),
            });
        };
        Ok(Location::try_from(row)?)
    }

    async fn list_locations(&self, world_id: WorldId) -> Result<Vec<Location>, ReactorError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r"SELECT id, world_id, name, status, controlled_by
              FROM locations WHERE world_id = $1 ORDER BY name",
        )
        .bind(world_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|row| Location::try_from(row).map_err(ReactorError::from))
            .collect()
    }

    async fn update_location(&self, location: &Location) -> Result<(), ReactorError> {
        let updated = sqlx::query(
            r"UPDATE locations SET name = $2, status = $3, controlled_by = $4 WHERE id = $1",
        )
        .bind(location.id.into_inner())
        .bind(&location.name)
        .bind(codec::location_status_to_db(location.status))
        .bind(location.controlled_by.map(FactionId::into_inner))
        .execute(&self.pool)
        .await
        .map_err(pg)?;

        if updated.rows_affected() == 0 {
            return Err(ReactorError::NotFound {
                entity: "location",
                id: location.id.to_string(),
            });
        }
        Ok(())
    }

    async fn append_location_history(
        &self,
        location_id: LocationId,
        entry: &str,
    ) -> Result<(), ReactorError> {
        sqlx::query(r"INSERT INTO location_history (location_id, entry) VALUES ($1, $2)")
            .bind(location_id.into_inner())
            .bind(entry)
            .execute(&self.pool)
            .await
            .map_err(pg)?;
        Ok(())
    }
}
