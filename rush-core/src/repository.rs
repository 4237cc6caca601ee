use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Car, Role, Trip, User};

/// A document together with the version it was read at. Commits carry the
/// version back so the store can reject writes based on stale reads.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("concurrency conflict on {collection}:{id} (expected version {expected:?}, actual {actual:?})")]
    Conflict {
        collection: &'static str,
        id: Uuid,
        expected: Option<u64>,
        actual: Option<u64>,
    },
    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: Uuid },
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What happens to the trip document itself.
#[derive(Debug, Clone)]
pub enum TripWrite {
    Insert(Trip),
    Update(Trip),
    Delete,
}

/// Cross-reference maintenance on user records, applied in the same
/// transaction as the trip write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListUpdate {
    AddReservedTrip { user_id: Uuid, trip_id: Uuid },
    RemoveReservedTrip { user_id: Uuid, trip_id: Uuid },
    AddOwnedTrip { user_id: Uuid, trip_id: Uuid },
    RemoveOwnedTrip { user_id: Uuid, trip_id: Uuid },
}

impl UserListUpdate {
    pub fn user_id(&self) -> Uuid {
        match self {
            UserListUpdate::AddReservedTrip { user_id, .. }
            | UserListUpdate::RemoveReservedTrip { user_id, .. }
            | UserListUpdate::AddOwnedTrip { user_id, .. }
            | UserListUpdate::RemoveOwnedTrip { user_id, .. } => *user_id,
        }
    }
}

/// One all-or-nothing write against the trip collection.
///
/// `expected_version` is `None` for inserts (the id must not exist yet) and
/// the version returned by [`TripStore::read_trip`] otherwise.
#[derive(Debug, Clone)]
pub struct TripCommit {
    pub trip_id: Uuid,
    pub expected_version: Option<u64>,
    pub write: TripWrite,
    pub user_updates: Vec<UserListUpdate>,
}

/// Transactional document store for trips.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn read_trip(&self, id: Uuid) -> StoreResult<Option<Versioned<Trip>>>;

    /// Applies the commit atomically.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored version differs
    /// from `expected_version`, with [`StoreError::NotFound`] when an update
    /// or delete targets a trip that no longer exists, and with
    /// `NotFound { collection: "users", .. }` when an `Add*` user update
    /// targets an unknown user. Removals on unknown users are no-ops.
    async fn commit(&self, commit: TripCommit) -> StoreResult<()>;

    /// Trips with at least one place left.
    async fn list_available_trips(&self) -> StoreResult<Vec<Trip>>;

    async fn list_trips_by_car(&self, car_id: Uuid) -> StoreResult<Vec<Trip>>;

    async fn list_trips_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Trip>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] if `id_user` or `email` is taken.
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Overwrites profile fields and password hash. List fields are left alone.
    async fn update_profile(&self, user: &User) -> StoreResult<()>;

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<()>;
}

#[async_trait]
pub trait CarRepository: Send + Sync {
    /// Inserts the car and links it to its owner.
    async fn create_car(&self, car: &Car) -> StoreResult<()>;

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>>;

    async fn update_car(&self, car: &Car) -> StoreResult<()>;

    /// Deletes the car and unlinks it from its owner.
    async fn delete_car(&self, id: Uuid) -> StoreResult<()>;
}

/// Read-only view used to bound trip capacity and check ownership.
#[async_trait]
pub trait CarDirectory: Send + Sync {
    async fn get_capacity(&self, car_id: Uuid) -> StoreResult<Option<u32>>;

    async fn get_owner(&self, car_id: Uuid) -> StoreResult<Option<Uuid>>;
}

#[async_trait]
impl<R> CarDirectory for R
where
    R: CarRepository + ?Sized,
{
    async fn get_capacity(&self, car_id: Uuid) -> StoreResult<Option<u32>> {
        Ok(self.get_car(car_id).await?.map(|car| car.passengers))
    }

    async fn get_owner(&self, car_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.get_car(car_id).await?.map(|car| car.owner_id))
    }
}
