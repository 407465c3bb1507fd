//! MessageBroker adapters

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use inmemory::{InMemoryBroker, InMemoryBrokerHub};
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBroker;
