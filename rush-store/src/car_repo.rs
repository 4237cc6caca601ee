use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rush_core::{Car, CarRepository, StoreError, StoreResult};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::{from_db_count, map_sqlx, to_db_count};

pub struct PgCarRepository {
    pool: PgPool,
}

impl PgCarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CarRow {
    id: Uuid,
    owner_id: Uuid,
    plate: String,
    passengers: i32,
    brand: String,
    model: String,
    photo_car_url: Option<String>,
    photo_soat_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CarRow> for Car {
    type Error = StoreError;

    fn try_from(row: CarRow) -> Result<Self, Self::Error> {
        Ok(Car {
            id: row.id,
            owner_id: row.owner_id,
            plate: row.plate,
            passengers: from_db_count(row.passengers)?,
            brand: row.brand,
            model: row.model,
            photo_car_url: row.photo_car_url,
            photo_soat_url: row.photo_soat_url,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CarRepository for PgCarRepository {
    async fn create_car(&self, car: &Car) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // Link first: a missing owner aborts before the insert trips the FK.
        let linked = sqlx::query(
            "UPDATE users SET car_ids = array_append(array_remove(car_ids, $1), $1) WHERE id = $2",
        )
        .bind(car.id)
        .bind(car.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        if linked.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection: "users", id: car.owner_id });
        }

        sqlx::query(
            r#"
            INSERT INTO cars (id, owner_id, plate, passengers, brand, model, photo_car_url, photo_soat_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(car.id)
        .bind(car.owner_id)
        .bind(&car.plate)
        .bind(to_db_count(car.passengers)?)
        .bind(&car.brand)
        .bind(&car.model)
        .bind(&car.photo_car_url)
        .bind(&car.photo_soat_url)
        .bind(car.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>> {
        let row = sqlx::query_as::<_, CarRow>(
            r#"
            SELECT id, owner_id, plate, passengers, brand, model, photo_car_url, photo_soat_url, created_at
            FROM cars WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(Car::try_from).transpose()
    }

    async fn update_car(&self, car: &Car) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cars
            SET plate = $1, passengers = $2, brand = $3, model = $4, photo_car_url = $5, photo_soat_url = $6
            WHERE id = $7
            "#,
        )
        .bind(&car.plate)
        .bind(to_db_count(car.passengers)?)
        .bind(&car.brand)
        .bind(&car.model)
        .bind(&car.photo_car_url)
        .bind(&car.photo_soat_url)
        .bind(car.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection: "cars", id: car.id });
        }
        Ok(())
    }

    async fn delete_car(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let deleted = sqlx::query("DELETE FROM cars WHERE id = $1 RETURNING owner_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .ok_or(StoreError::NotFound { collection: "cars", id })?;
        let owner_id: Uuid = deleted.try_get("owner_id").map_err(map_sqlx)?;

        sqlx::query("UPDATE users SET car_ids = array_remove(car_ids, $1) WHERE id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }
}
