pub mod cached;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod repository;

pub use cached::CachedRepository;
pub use memory::InMemoryRepository;
pub use postgres::{create_pool, run_migrations, PgMatchRepository};
pub use self::redis::create_redis_client;
pub use self::redis::Cache;
pub use self::redis::CacheKey;
pub use self::redis::CacheWriterHandle;
pub use repository::MatchRepository;

#[cfg(test)]
pub use repository::MockMatchRepository;
