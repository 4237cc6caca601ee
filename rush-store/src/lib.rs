pub mod app_config;
pub mod car_repo;
pub mod database;
pub mod events;
pub mod redis_repo;
pub mod trip_repo;
pub mod user_repo;

pub use car_repo::PgCarRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
pub use trip_repo::PgTripStore;
pub use user_repo::PgUserRepository;
