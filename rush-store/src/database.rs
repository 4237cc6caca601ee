use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use rush_core::StoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Unique violations become `Duplicate` carrying the constraint name; every
/// other driver error is opaque to callers.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

/// Postgres has no unsigned integers; counts are stored as INTEGER.
pub(crate) fn to_db_count(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Serde(format!("count {} out of range", value)))
}

pub(crate) fn from_db_count(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Serde(format!("negative count {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_reject_out_of_range_values() {
        assert_eq!(to_db_count(4).unwrap(), 4);
        assert!(to_db_count(u32::MAX).is_err());
        assert_eq!(from_db_count(3).unwrap(), 3);
        assert!(from_db_count(-1).is_err());
    }

    #[test]
    fn test_non_database_errors_are_backend_errors() {
        let err = map_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
