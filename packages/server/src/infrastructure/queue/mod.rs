//! MessageQueue adapters

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use inmemory::InMemoryMessageQueue;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisMessageQueue;
