//! KeyValueStore adapters

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use inmemory::InMemoryKeyValueStore;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisKeyValueStore;
