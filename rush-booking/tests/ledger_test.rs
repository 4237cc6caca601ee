use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rush_booking::{BookingLedger, InMemoryStore, LedgerError, LedgerSettings, NewTrip, TripUpdate};
use rush_core::events::EventPublisher;
use rush_core::{
    Car, CarRepository, CoreResult, StoreError, StoreResult, Trip, TripCommit, TripDetails,
    TripStatus, TripStore, User, UserRepository, Versioned,
};
use rush_shared::models::events::LedgerEvent;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<LedgerEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &LedgerEvent) -> CoreResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Reports a version conflict on the first `failures` commits.
struct FlakyStore {
    inner: Arc<InMemoryStore>,
    failures: AtomicU32,
}

#[async_trait]
impl TripStore for FlakyStore {
    async fn read_trip(&self, id: Uuid) -> StoreResult<Option<Versioned<Trip>>> {
        self.inner.read_trip(id).await
    }

    async fn commit(&self, commit: TripCommit) -> StoreResult<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                collection: "trips",
                id: commit.trip_id,
                expected: commit.expected_version,
                actual: commit.expected_version.map(|v| v + 1),
            });
        }
        self.inner.commit(commit).await
    }

    async fn list_available_trips(&self) -> StoreResult<Vec<Trip>> {
        self.inner.list_available_trips().await
    }

    async fn list_trips_by_car(&self, car_id: Uuid) -> StoreResult<Vec<Trip>> {
        self.inner.list_trips_by_car(car_id).await
    }

    async fn list_trips_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Trip>> {
        self.inner.list_trips_by_ids(ids).await
    }
}

fn settings() -> LedgerSettings {
    LedgerSettings {
        max_attempts: 3,
        retry_backoff: Duration::from_millis(1),
    }
}

fn details() -> TripDetails {
    TripDetails {
        start_trip: "Campus Norte".into(),
        end_trip: "Centro".into(),
        route: "Av. Roosevelt".into(),
        time_trip: "07:15".into(),
        date: "23-10-2026".into(),
        price_trip: 6000,
    }
}

async fn user(store: &InMemoryStore, id_user: &str) -> Uuid {
    let user = User::new(
        id_user.into(),
        "Test".into(),
        "User".into(),
        format!("{}@campus.edu", id_user),
        "3000000000".into(),
        "hash".into(),
    );
    store.create_user(&user).await.unwrap();
    user.id
}

struct Fixture {
    store: Arc<InMemoryStore>,
    ledger: BookingLedger,
    events: Arc<RecordingPublisher>,
    driver: Uuid,
    car: Uuid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let driver = user(&store, "900").await;
    let car = Car::new(driver, "ABC123".into(), 4, "Mazda".into(), "2019".into());
    store.create_car(&car).await.unwrap();

    let events = Arc::new(RecordingPublisher::default());
    let ledger = BookingLedger::new(store.clone(), store.clone(), events.clone(), settings());

    Fixture {
        store,
        ledger,
        events,
        driver,
        car: car.id,
    }
}

impl Fixture {
    async fn trip(&self, capacity: u32) -> Trip {
        self.ledger
            .create_trip(NewTrip {
                car_id: self.car,
                driver_id: self.driver,
                details: details(),
                capacity_total: capacity,
                stops: vec!["Centro".into()],
            })
            .await
            .unwrap()
    }
}

fn stops(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_create_trip_links_driver() {
    let f = fixture().await;
    let trip = f.trip(4).await;

    let driver = f.store.get_user(f.driver).await.unwrap().unwrap();
    assert_eq!(driver.my_trips, vec![trip.id]);
    assert_eq!(trip.available_places, 4);
}

#[tokio::test]
async fn test_create_trip_rejects_foreign_car_and_oversized_capacity() {
    let f = fixture().await;
    let stranger = user(&f.store, "901").await;

    let err = f
        .ledger
        .create_trip(NewTrip {
            car_id: f.car,
            driver_id: stranger,
            details: details(),
            capacity_total: 2,
            stops: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotCarOwner { .. }));

    let err = f
        .ledger
        .create_trip(NewTrip {
            car_id: f.car,
            driver_id: f.driver,
            details: details(),
            capacity_total: 5,
            stops: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = f
        .ledger
        .create_trip(NewTrip {
            car_id: Uuid::new_v4(),
            driver_id: f.driver,
            details: details(),
            capacity_total: 1,
            stops: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CarNotFound(_)));
}

#[tokio::test]
async fn test_worked_example_through_the_store() {
    let f = fixture().await;
    let trip = f.trip(4).await;
    let user_a = user(&f.store, "1").await;
    let user_b = user(&f.store, "2").await;

    f.ledger.reserve(trip.id, user_a, 3, &stops(&["Portal"])).await.unwrap();
    let t = f.ledger.trip(trip.id).await.unwrap();
    assert_eq!(t.available_places, 1);
    assert_eq!(t.status(), TripStatus::Available);

    let err = f.ledger.reserve(trip.id, user_b, 2, &stops(&["Museo"])).await.unwrap_err();
    assert!(matches!(err, LedgerError::CapacityExceeded { requested: 2, available: 1 }));

    f.ledger.reserve(trip.id, user_b, 1, &stops(&["Museo"])).await.unwrap();
    let t = f.ledger.trip(trip.id).await.unwrap();
    assert_eq!(t.available_places, 0);
    assert_eq!(t.status(), TripStatus::Full);

    let released = f.ledger.cancel_reservation(trip.id, user_a).await.unwrap();
    assert_eq!(released, 3);
    let t = f.ledger.trip(trip.id).await.unwrap();
    assert_eq!(t.available_places, 3);
    assert_eq!(t.status(), TripStatus::Available);

    let a = f.store.get_user(user_a).await.unwrap().unwrap();
    let b = f.store.get_user(user_b).await.unwrap().unwrap();
    assert!(a.reserved_trips.is_empty());
    assert_eq!(b.reserved_trips, vec![trip.id]);
}

#[tokio::test]
async fn test_reserve_validates_before_touching_store() {
    let f = fixture().await;
    let trip = f.trip(2).await;
    let rider = user(&f.store, "3").await;

    let err = f.ledger.reserve(trip.id, rider, 0, &stops(&["Portal"])).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = f.ledger.reserve(trip.id, rider, 1, &[]).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = f.ledger.reserve(Uuid::new_v4(), rider, 1, &stops(&["Portal"])).await.unwrap_err();
    assert!(matches!(err, LedgerError::TripNotFound(_)));

    assert!(f.events.events.lock().await.is_empty());
}

#[tokio::test]
async fn test_reserve_by_unknown_user_leaves_trip_untouched() {
    let f = fixture().await;
    let trip = f.trip(2).await;

    let err = f
        .ledger
        .reserve(trip.id, Uuid::new_v4(), 1, &stops(&["Portal"]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UserNotFound(_)));

    let t = f.ledger.trip(trip.id).await.unwrap();
    assert_eq!(t.available_places, 2);
    assert!(t.reservations.is_empty());
}

#[tokio::test]
async fn test_cancel_stop_shared_by_two_reservations() {
    let f = fixture().await;
    let trip = f.trip(4).await;
    let user_a = user(&f.store, "4").await;
    let user_b = user(&f.store, "5").await;

    f.ledger.reserve(trip.id, user_a, 1, &stops(&["Portal", "Museo"])).await.unwrap();
    f.ledger.reserve(trip.id, user_b, 1, &stops(&["Portal", "Parque"])).await.unwrap();

    let voided = f.ledger.cancel_stop(trip.id, "Portal").await.unwrap();
    assert!(voided.is_empty());

    let t = f.ledger.trip(trip.id).await.unwrap();
    assert!(!t.has_stop("Portal"));
    assert!(t.reservations.iter().all(|r| !r.references_stop("Portal")));
    assert!(t.is_balanced());

    let err = f.ledger.cancel_stop(trip.id, "Portal").await.unwrap_err();
    assert!(matches!(err, LedgerError::StopNotFound { .. }));
}

#[tokio::test]
async fn test_cancel_stop_voiding_reservation_updates_user() {
    let f = fixture().await;
    let trip = f.trip(4).await;
    let rider = user(&f.store, "6").await;

    f.ledger.reserve(trip.id, rider, 2, &stops(&["Portal"])).await.unwrap();
    let voided = f.ledger.cancel_stop(trip.id, "Portal").await.unwrap();
    assert_eq!(voided, vec![rider]);

    let t = f.ledger.trip(trip.id).await.unwrap();
    assert_eq!(t.available_places, 4);
    let rider = f.store.get_user(rider).await.unwrap().unwrap();
    assert!(rider.reserved_trips.is_empty());
}

#[tokio::test]
async fn test_cancel_trip_cascades_and_second_call_is_not_found() {
    let f = fixture().await;
    let trip = f.trip(3).await;
    let rider = user(&f.store, "7").await;
    f.ledger.reserve(trip.id, rider, 1, &stops(&["Portal"])).await.unwrap();

    let affected = f.ledger.cancel_trip(trip.id).await.unwrap();
    assert_eq!(affected, vec![rider]);

    let rider = f.store.get_user(rider).await.unwrap().unwrap();
    let driver = f.store.get_user(f.driver).await.unwrap().unwrap();
    assert!(rider.reserved_trips.is_empty());
    assert!(driver.my_trips.is_empty());

    let err = f.ledger.cancel_trip(trip.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::TripNotFound(_)));

    let events = f.events.events.lock().await;
    assert!(matches!(events.last(), Some(LedgerEvent::TripCancelled(_))));
}

#[tokio::test]
async fn test_update_trip_keeps_balance() {
    let f = fixture().await;
    let trip = f.trip(2).await;
    let rider = user(&f.store, "8").await;
    f.ledger.reserve(trip.id, rider, 2, &stops(&["Portal"])).await.unwrap();

    let mut new_details = details();
    new_details.time_trip = "08:00".into();
    let updated = f
        .ledger
        .update_trip(
            trip.id,
            TripUpdate {
                details: new_details,
                capacity_total: Some(4),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.details.time_trip, "08:00");
    assert_eq!(updated.available_places, 2);
    assert!(updated.is_balanced());
}

#[tokio::test]
async fn test_update_trip_details_after_car_removed() {
    let f = fixture().await;
    let trip = f.trip(4).await;
    f.store.delete_car(f.car).await.unwrap();

    let mut new_details = details();
    new_details.route = "Carrera 15".into();
    let updated = f
        .ledger
        .update_trip(
            trip.id,
            TripUpdate {
                details: new_details.clone(),
                capacity_total: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.details.route, "Carrera 15");
    assert_eq!(updated.capacity_total, 4);

    let err = f
        .ledger
        .update_trip(
            trip.id,
            TripUpdate {
                details: new_details,
                capacity_total: Some(3),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CarNotFound(_)));
}

struct FlakySetup {
    inner: Arc<InMemoryStore>,
    flaky: Arc<FlakyStore>,
    ledger: BookingLedger,
    trip: Trip,
    rider: Uuid,
}

async fn flaky_setup() -> FlakySetup {
    let inner = Arc::new(InMemoryStore::new());
    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        failures: AtomicU32::new(0),
    });

    let driver = user(&inner, "910").await;
    let car = Car::new(driver, "XYZ987".into(), 4, "Kia".into(), "2021".into());
    inner.create_car(&car).await.unwrap();
    let rider = user(&inner, "911").await;

    let events = Arc::new(RecordingPublisher::default());
    let ledger = BookingLedger::new(flaky.clone(), inner.clone(), events, settings());
    let trip = ledger
        .create_trip(NewTrip {
            car_id: car.id,
            driver_id: driver,
            details: details(),
            capacity_total: 4,
            stops: vec![],
        })
        .await
        .unwrap();

    FlakySetup {
        inner,
        flaky,
        ledger,
        trip,
        rider,
    }
}

#[tokio::test]
async fn test_conflicts_are_retried_then_succeed() {
    let s = flaky_setup().await;

    s.flaky.failures.store(2, Ordering::SeqCst);
    s.ledger.reserve(s.trip.id, s.rider, 1, &stops(&["Portal"])).await.unwrap();
    assert_eq!(s.ledger.trip(s.trip.id).await.unwrap().available_places, 3);
}

#[tokio::test]
async fn test_conflicts_exhaust_into_transient_error() {
    let s = flaky_setup().await;

    s.flaky.failures.store(10, Ordering::SeqCst);
    let err = s
        .ledger
        .reserve(s.trip.id, s.rider, 1, &stops(&["Portal"]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransientConflict { attempts: 3, .. }));
    assert!(err.is_retryable());

    let t = s.inner.read_trip(s.trip.id).await.unwrap().unwrap().data;
    assert_eq!(t.available_places, 4);
    assert!(t.reservations.is_empty());
}
