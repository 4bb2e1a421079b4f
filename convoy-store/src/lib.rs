pub mod app_config;
pub mod database;
pub mod trip_repo;
pub mod redis_repo;
pub mod events;
pub mod memory_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use trip_repo::PostgresTripRepository;
pub use redis_repo::RedisClient;
pub use events::{EventProducer, LogNotifier};
pub use memory_repo::{InMemoryCache, InMemoryNotifier, InMemoryTripRepository};
