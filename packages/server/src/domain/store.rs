//! Shared key-value store port.
//!
//! The store is the only cross-instance mutable state: room metadata,
//! authorization results, admission tickets and traffic counters all live here.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

use super::error::StoreError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a string value, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Set only if the key does not exist. Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Add `delta` to an integer value. A missing key counts as 0 and, when
    /// created by this call, receives `ttl`.
    async fn increment(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError>;

    /// All fields of a hash. Empty when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Create a hash with `fields` only if `key` does not exist yet.
    /// Returns whether it was created.
    async fn hash_create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError>;

    /// Atomically add `delta` to a hash field if the key exists and the result
    /// stays within `[min, max]`. Returns the new value, or `None` when nothing
    /// changed.
    async fn hash_increment_within(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        min: i64,
        max: i64,
    ) -> Result<Option<i64>, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
