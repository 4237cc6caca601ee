use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rush_core::{Role, StoreError, StoreResult, User, UserRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    id_user: String,
    name: String,
    last_name: String,
    email: String,
    number: String,
    password_hash: String,
    role: String,
    photo_url: Option<String>,
    car_ids: Vec<Uuid>,
    reserved_trips: Vec<Uuid>,
    my_trips: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(StoreError::Serde)?;
        Ok(User {
            id: row.id,
            id_user: row.id_user,
            name: row.name,
            last_name: row.last_name,
            email: row.email,
            number: row.number,
            password_hash: row.password_hash,
            role,
            photo_url: row.photo_url,
            car_ids: row.car_ids,
            reserved_trips: row.reserved_trips,
            my_trips: row.my_trips,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, id_user, name, last_name, email, number, password_hash, role, \
     photo_url, car_ids, reserved_trips, my_trips, created_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, id_user, name, last_name, email, number, password_hash, role, photo_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.id_user)
        .bind(&user.name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.number)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.photo_url)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(User::try_from).transpose()
    }

    async fn update_profile(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET id_user = $1, name = $2, last_name = $3, email = $4, number = $5,
                password_hash = $6, photo_url = $7
            WHERE id = $8
            "#,
        )
        .bind(&user.id_user)
        .bind(&user.name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.number)
        .bind(&user.password_hash)
        .bind(&user.photo_url)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection: "users", id: user.id });
        }
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection: "users", id });
        }
        Ok(())
    }
}
