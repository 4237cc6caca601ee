use std::sync::Arc;

use rush_booking::{BookingLedger, InMemoryStore, LedgerSettings};
use rush_core::{CarDirectory, CarRepository, TripStore, UserRepository};
use rush_shared::models::events::LedgerEvent;
use rush_store::app_config::{CorsConfig, RateLimitConfig};
use rush_store::{
    DbClient, EventProducer, PgCarRepository, PgTripStore, PgUserRepository, RedisClient,
};
use tokio::sync::broadcast;

use crate::events::LedgerEventFanout;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Storage handles shared by the ledger and the plain CRUD handlers.
#[derive(Clone)]
pub struct Repositories {
    pub trips: Arc<dyn TripStore>,
    pub users: Arc<dyn UserRepository>,
    pub cars: Arc<dyn CarRepository>,
    pub car_directory: Arc<dyn CarDirectory>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            trips: store.clone(),
            users: store.clone(),
            cars: store.clone(),
            car_directory: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        let pool = db.pool.clone();
        let cars = Arc::new(PgCarRepository::new(pool.clone()));
        Self {
            trips: Arc::new(PgTripStore::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool)),
            cars: cars.clone(),
            car_directory: cars,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: BookingLedger,
    pub trips: Arc<dyn TripStore>,
    pub users: Arc<dyn UserRepository>,
    pub cars: Arc<dyn CarRepository>,
    /// `None` disables rate limiting.
    pub redis: Option<Arc<RedisClient>>,
    pub sse_tx: broadcast::Sender<LedgerEvent>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        kafka: Option<Arc<EventProducer>>,
        settings: LedgerSettings,
        auth: AuthConfig,
    ) -> Self {
        let (sse_tx, _) = broadcast::channel(100);
        let publisher = Arc::new(LedgerEventFanout::new(sse_tx.clone(), kafka));
        let ledger = BookingLedger::new(repos.trips.clone(), repos.car_directory, publisher, settings);

        Self {
            ledger,
            trips: repos.trips,
            users: repos.users,
            cars: repos.cars,
            redis: None,
            sse_tx,
            auth,
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }
}
