use std::collections::HashMap;

use async_trait::async_trait;
use rush_core::{
    Car, CarRepository, Role, StoreError, StoreResult, Trip, TripCommit, TripStore, TripWrite,
    User, UserListUpdate, UserRepository, Versioned,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    trips: HashMap<Uuid, Versioned<Trip>>,
    users: HashMap<Uuid, User>,
    cars: HashMap<Uuid, Car>,
}

/// Process-local store with the same commit semantics as the Postgres one:
/// version checks, all-or-nothing user list updates. Backs the test suites and
/// `storage.backend = "memory"` local runs.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push_unique(list: &mut Vec<Uuid>, id: Uuid) {
    if !list.contains(&id) {
        list.push(id);
    }
}

#[async_trait]
impl TripStore for InMemoryStore {
    async fn read_trip(&self, id: Uuid) -> StoreResult<Option<Versioned<Trip>>> {
        Ok(self.state.read().await.trips.get(&id).cloned())
    }

    async fn commit(&self, commit: TripCommit) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let actual = state.trips.get(&commit.trip_id).map(|t| t.version);
        match (&commit.write, commit.expected_version, actual) {
            (TripWrite::Insert(_), None, None) => {}
            (TripWrite::Update(_) | TripWrite::Delete, Some(_), None) => {
                return Err(StoreError::NotFound {
                    collection: "trips",
                    id: commit.trip_id,
                });
            }
            (_, expected, actual) if expected == actual && expected.is_some() => {}
            (_, expected, actual) => {
                return Err(StoreError::Conflict {
                    collection: "trips",
                    id: commit.trip_id,
                    expected,
                    actual,
                });
            }
        }

        // Validate every user reference before mutating anything.
        for update in &commit.user_updates {
            let adds = matches!(
                update,
                UserListUpdate::AddReservedTrip { .. } | UserListUpdate::AddOwnedTrip { .. }
            );
            if adds && !state.users.contains_key(&update.user_id()) {
                return Err(StoreError::NotFound {
                    collection: "users",
                    id: update.user_id(),
                });
            }
        }

        let next_version = actual.unwrap_or(0) + 1;
        match commit.write {
            TripWrite::Insert(trip) | TripWrite::Update(trip) => {
                state.trips.insert(
                    commit.trip_id,
                    Versioned {
                        data: trip,
                        version: next_version,
                    },
                );
            }
            TripWrite::Delete => {
                state.trips.remove(&commit.trip_id);
            }
        }

        for update in commit.user_updates {
            let Some(user) = state.users.get_mut(&update.user_id()) else {
                continue;
            };
            match update {
                UserListUpdate::AddReservedTrip { trip_id, .. } => {
                    push_unique(&mut user.reserved_trips, trip_id)
                }
                UserListUpdate::RemoveReservedTrip { trip_id, .. } => {
                    user.reserved_trips.retain(|id| *id != trip_id)
                }
                UserListUpdate::AddOwnedTrip { trip_id, .. } => push_unique(&mut user.my_trips, trip_id),
                UserListUpdate::RemoveOwnedTrip { trip_id, .. } => {
                    user.my_trips.retain(|id| *id != trip_id)
                }
            }
        }

        Ok(())
    }

    async fn list_available_trips(&self) -> StoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| t.data.available_places > 0)
            .map(|t| t.data.clone())
            .collect();
        trips.sort_by_key(|t| t.created_at);
        Ok(trips)
    }

    async fn list_trips_by_car(&self, car_id: Uuid) -> StoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| t.data.car_id == car_id)
            .map(|t| t.data.clone())
            .collect();
        trips.sort_by_key(|t| t.created_at);
        Ok(trips)
    }

    async fn list_trips_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.trips.get(id).map(|t| t.data.clone()))
            .collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.id_user == user.id_user) {
            return Err(StoreError::Duplicate("id_user".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && (u.email == user.email || u.id_user == user.id_user))
        {
            return Err(StoreError::Duplicate("email or id_user".to_string()));
        }
        let stored = state.users.get_mut(&user.id).ok_or(StoreError::NotFound {
            collection: "users",
            id: user.id,
        })?;
        stored.id_user = user.id_user.clone();
        stored.name = user.name.clone();
        stored.last_name = user.last_name.clone();
        stored.email = user.email.clone();
        stored.number = user.number.clone();
        stored.password_hash = user.password_hash.clone();
        stored.photo_url = user.photo_url.clone();
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound {
            collection: "users",
            id,
        })?;
        user.role = role;
        Ok(())
    }
}

#[async_trait]
impl CarRepository for InMemoryStore {
    async fn create_car(&self, car: &Car) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let owner = state.users.get_mut(&car.owner_id).ok_or(StoreError::NotFound {
            collection: "users",
            id: car.owner_id,
        })?;
        push_unique(&mut owner.car_ids, car.id);
        state.cars.insert(car.id, car.clone());
        Ok(())
    }

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>> {
        Ok(self.state.read().await.cars.get(&id).cloned())
    }

    async fn update_car(&self, car: &Car) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let stored = state.cars.get_mut(&car.id).ok_or(StoreError::NotFound {
            collection: "cars",
            id: car.id,
        })?;
        stored.plate = car.plate.clone();
        stored.passengers = car.passengers;
        stored.brand = car.brand.clone();
        stored.model = car.model.clone();
        stored.photo_car_url = car.photo_car_url.clone();
        stored.photo_soat_url = car.photo_soat_url.clone();
        Ok(())
    }

    async fn delete_car(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let car = state.cars.remove(&id).ok_or(StoreError::NotFound {
            collection: "cars",
            id,
        })?;
        if let Some(owner) = state.users.get_mut(&car.owner_id) {
            owner.car_ids.retain(|c| *c != id);
        }
        Ok(())
    }
}
