use std::sync::Arc;
use std::time::Duration;

use rush_booking::{BookingLedger, InMemoryStore, LedgerError, LedgerSettings, NewTrip};
use rush_core::events::NoopPublisher;
use rush_core::{Car, CarRepository, TripDetails, TripStatus, User, UserRepository};
use uuid::Uuid;

async fn setup(capacity: u32, riders: usize) -> (Arc<InMemoryStore>, BookingLedger, Uuid, Vec<Uuid>) {
    let store = Arc::new(InMemoryStore::new());

    let driver = User::new(
        "500".into(),
        "Driver".into(),
        "One".into(),
        "driver@campus.edu".into(),
        "3000000000".into(),
        "hash".into(),
    );
    store.create_user(&driver).await.unwrap();
    let car = Car::new(driver.id, "DEF456".into(), capacity, "Chevrolet".into(), "2020".into());
    store.create_car(&car).await.unwrap();

    let mut rider_ids = Vec::with_capacity(riders);
    for i in 0..riders {
        let rider = User::new(
            format!("{}", 1000 + i),
            "Rider".into(),
            "Test".into(),
            format!("rider{}@campus.edu", i),
            "3000000000".into(),
            "hash".into(),
        );
        store.create_user(&rider).await.unwrap();
        rider_ids.push(rider.id);
    }

    // Generous retry budget: every task races on the same document.
    let settings = LedgerSettings {
        max_attempts: 200,
        retry_backoff: Duration::from_micros(50),
    };
    let ledger = BookingLedger::new(store.clone(), store.clone(), Arc::new(NoopPublisher), settings);

    let trip = ledger
        .create_trip(NewTrip {
            car_id: car.id,
            driver_id: driver.id,
            details: TripDetails {
                start_trip: "Campus".into(),
                end_trip: "Aeropuerto".into(),
                route: "Calle 26".into(),
                time_trip: "05:00".into(),
                date: "24-10-2026".into(),
                price_trip: 12000,
            },
            capacity_total: capacity,
            stops: vec![],
        })
        .await
        .unwrap();

    (store, ledger, trip.id, rider_ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserves_never_overbook() {
    let capacity = 6;
    let (store, ledger, trip_id, riders) = setup(capacity, 20).await;

    let mut handles = Vec::new();
    for rider in riders.clone() {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.reserve(trip_id, rider, 1, &["Portal".to_string()]).await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::CapacityExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(accepted, capacity as usize);
    assert_eq!(rejected, riders.len() - capacity as usize);

    let trip = ledger.trip(trip_id).await.unwrap();
    assert_eq!(trip.available_places, 0);
    assert_eq!(trip.status(), TripStatus::Full);
    assert_eq!(trip.seats_reserved(), capacity);
    assert!(trip.is_balanced());

    // Every accepted rider, and only they, carry the trip in their list.
    let mut linked = 0;
    for rider in riders {
        let user = store.get_user(rider).await.unwrap().unwrap();
        let has_reservation = trip.reservation_for(&rider).is_some();
        assert_eq!(user.reserved_trips.contains(&trip_id), has_reservation);
        if has_reservation {
            linked += 1;
        }
    }
    assert_eq!(linked, capacity as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_reserve_and_cancel_keep_invariant() {
    let (_store, ledger, trip_id, riders) = setup(4, 8).await;

    // First half books, then cancels while the second half books.
    for rider in &riders[..4] {
        ledger.reserve(trip_id, *rider, 1, &["Portal".to_string()]).await.unwrap();
    }

    let mut handles = Vec::new();
    for rider in riders[..4].iter().copied() {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.cancel_reservation(trip_id, rider).await.map(|_| ())
        }));
    }
    for rider in riders[4..].iter().copied() {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .reserve(trip_id, rider, 1, &["Museo".to_string()])
                .await
                .map(|_| ())
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(LedgerError::CapacityExceeded { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    let trip = ledger.trip(trip_id).await.unwrap();
    assert!(trip.is_balanced());
    assert!(trip.seats_reserved() <= trip.capacity_total);
    assert!(trip.reservations.iter().all(|r| !riders[..4].contains(&r.user_id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reserve_racing_cancel_trip_never_lands_on_deleted_trip() {
    let (store, ledger, trip_id, riders) = setup(4, 4).await;

    let cancel = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.cancel_trip(trip_id).await })
    };
    let mut reserves = Vec::new();
    for rider in riders.clone() {
        let ledger = ledger.clone();
        reserves.push(tokio::spawn(async move {
            ledger.reserve(trip_id, rider, 1, &["Portal".to_string()]).await
        }));
    }

    cancel.await.unwrap().unwrap();
    for handle in reserves {
        match handle.await.unwrap() {
            Ok(_) | Err(LedgerError::TripNotFound(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert!(matches!(ledger.trip(trip_id).await, Err(LedgerError::TripNotFound(_))));
    for rider in riders {
        let user = store.get_user(rider).await.unwrap().unwrap();
        assert!(!user.reserved_trips.contains(&trip_id));
    }
}
