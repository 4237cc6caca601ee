use async_trait::async_trait;
use rush_core::{
    StoreError, StoreResult, Trip, TripCommit, TripStore, TripWrite, UserListUpdate, Versioned,
};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::database::{map_sqlx, to_db_count};

/// Trips stored as one JSONB document per row next to a `version` column.
/// Updates and deletes are compare-and-swap on that column, so two writers
/// that read the same version cannot both commit.
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a version-guarded statement touched no row.
    async fn diagnose_miss(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        expected: u64,
    ) -> StoreError {
        let current = sqlx::query("SELECT version FROM trips WHERE id = $1")
            .bind(trip_id)
            .fetch_optional(&mut **tx)
            .await;

        match current {
            Ok(Some(row)) => StoreError::Conflict {
                collection: "trips",
                id: trip_id,
                expected: Some(expected),
                actual: row.try_get::<i64, _>("version").ok().map(|v| v as u64),
            },
            Ok(None) => StoreError::NotFound {
                collection: "trips",
                id: trip_id,
            },
            Err(e) => map_sqlx(e),
        }
    }

    async fn apply_user_update(
        tx: &mut Transaction<'_, Postgres>,
        update: &UserListUpdate,
    ) -> StoreResult<()> {
        // array_remove before array_append keeps the lists free of duplicates.
        let (sql, must_exist) = match update {
            UserListUpdate::AddReservedTrip { .. } => (
                "UPDATE users SET reserved_trips = array_append(array_remove(reserved_trips, $1), $1) WHERE id = $2",
                true,
            ),
            UserListUpdate::RemoveReservedTrip { .. } => (
                "UPDATE users SET reserved_trips = array_remove(reserved_trips, $1) WHERE id = $2",
                false,
            ),
            UserListUpdate::AddOwnedTrip { .. } => (
                "UPDATE users SET my_trips = array_append(array_remove(my_trips, $1), $1) WHERE id = $2",
                true,
            ),
            UserListUpdate::RemoveOwnedTrip { .. } => (
                "UPDATE users SET my_trips = array_remove(my_trips, $1) WHERE id = $2",
                false,
            ),
        };
        let trip_id = match update {
            UserListUpdate::AddReservedTrip { trip_id, .. }
            | UserListUpdate::RemoveReservedTrip { trip_id, .. }
            | UserListUpdate::AddOwnedTrip { trip_id, .. }
            | UserListUpdate::RemoveOwnedTrip { trip_id, .. } => *trip_id,
        };

        let result = sqlx::query(sql)
            .bind(trip_id)
            .bind(update.user_id())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;

        if must_exist && result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: "users",
                id: update.user_id(),
            });
        }
        Ok(())
    }

    async fn fetch_documents(&self, query: SqlQuery<'_>) -> StoreResult<Vec<Trip>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Json<Trip>, _>("document")
                    .map(|doc| doc.0)
                    .map_err(|e| StoreError::Serde(e.to_string()))
            })
            .collect()
    }
}

type SqlQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn expected_version(commit: &TripCommit) -> StoreResult<u64> {
    commit.expected_version.ok_or(StoreError::Conflict {
        collection: "trips",
        id: commit.trip_id,
        expected: None,
        actual: None,
    })
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn read_trip(&self, id: Uuid) -> StoreResult<Option<Versioned<Trip>>> {
        let row = sqlx::query("SELECT document, version FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: Json<Trip> = row
            .try_get("document")
            .map_err(|e| StoreError::Serde(e.to_string()))?;
        let version: i64 = row.try_get("version").map_err(map_sqlx)?;

        Ok(Some(Versioned {
            data: document.0,
            version: version as u64,
        }))
    }

    async fn commit(&self, commit: TripCommit) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let trip_id = commit.trip_id;

        match &commit.write {
            TripWrite::Insert(trip) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO trips (id, car_id, driver_id, available_places, version, document, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(trip_id)
                .bind(trip.car_id)
                .bind(trip.driver_id)
                .bind(to_db_count(trip.available_places)?)
                .bind(Json(trip))
                .bind(trip.created_at)
                .bind(trip.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict {
                        collection: "trips",
                        id: trip_id,
                        expected: None,
                        actual: None,
                    });
                }
            }
            TripWrite::Update(trip) => {
                let expected = expected_version(&commit)?;
                let result = sqlx::query(
                    r#"
                    UPDATE trips
                    SET document = $1, available_places = $2, version = version + 1, updated_at = $3
                    WHERE id = $4 AND version = $5
                    "#,
                )
                .bind(Json(trip))
                .bind(to_db_count(trip.available_places)?)
                .bind(trip.updated_at)
                .bind(trip_id)
                .bind(expected as i64)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;

                if result.rows_affected() == 0 {
                    return Err(Self::diagnose_miss(&mut tx, trip_id, expected).await);
                }
            }
            TripWrite::Delete => {
                let expected = expected_version(&commit)?;
                let result = sqlx::query("DELETE FROM trips WHERE id = $1 AND version = $2")
                    .bind(trip_id)
                    .bind(expected as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx)?;

                if result.rows_affected() == 0 {
                    return Err(Self::diagnose_miss(&mut tx, trip_id, expected).await);
                }
            }
        }

        // Any early return drops `tx`, which rolls the trip write back too.
        for update in &commit.user_updates {
            Self::apply_user_update(&mut tx, update).await?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        debug!(
            "Committed trip {} with {} user list updates",
            trip_id,
            commit.user_updates.len()
        );
        Ok(())
    }

    async fn list_available_trips(&self) -> StoreResult<Vec<Trip>> {
        self.fetch_documents(sqlx::query(
            "SELECT document FROM trips WHERE available_places > 0 ORDER BY created_at",
        ))
        .await
    }

    async fn list_trips_by_car(&self, car_id: Uuid) -> StoreResult<Vec<Trip>> {
        self.fetch_documents(
            sqlx::query("SELECT document FROM trips WHERE car_id = $1 ORDER BY created_at")
                .bind(car_id),
        )
        .await
    }

    async fn list_trips_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Trip>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // Keep the caller's order; ids of deleted trips are skipped.
        self.fetch_documents(
            sqlx::query(
                r#"
                SELECT t.document
                FROM unnest($1::uuid[]) WITH ORDINALITY AS wanted(id, position)
                JOIN trips t ON t.id = wanted.id
                ORDER BY wanted.position
                "#,
            )
            .bind(ids.to_vec()),
        )
        .await
    }
}
