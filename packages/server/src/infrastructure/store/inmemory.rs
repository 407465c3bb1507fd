//! InMemory KeyValueStore 実装
//!
//! 単一プロセス内で共有ストアを模倣します。複数インスタンスを同一プロセスで
//! 動かす場合は、同じ `Arc<InMemoryKeyValueStore>` を渡すことでクラスタを再現できます。
//! TTL は注入された Clock を基準に、アクセス時に遅延評価で失効させます。

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bleachers_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

pub struct InMemoryKeyValueStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKeyValueStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn deadline(&self, ttl: Duration) -> i64 {
        self.clock.now_millis() + ttl.as_millis() as i64
    }
}

/// Drop `key` if its TTL has passed, then return the live entry.
fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: i64,
) -> Option<&'a mut Entry> {
    let expired = entries
        .get(key)
        .and_then(|entry| entry.expires_at)
        .is_some_and(|deadline| deadline <= now);
    if expired {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| self.deadline(ttl));
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let expires_at = Some(self.deadline(ttl));
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        let existed = live(&mut entries, key, now).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let deadline = self.deadline(ttl);
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at = Some(deadline);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let now = self.clock.now_millis();
        let expires_at = ttl.map(|ttl| self.deadline(ttl));
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => {
                let current: i64 = value.parse().map_err(|_| wrong_type(key))?;
                let next = current + delta;
                *value = next.to_string();
                Ok(next)
            }
            Some(_) => Err(wrong_type(key)),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str(delta.to_string()),
                        expires_at,
                    },
                );
                Ok(delta)
            }
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let expires_at = ttl.map(|ttl| self.deadline(ttl));
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        let hash = fields
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect();
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(hash),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key) {
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => {
                for (field, value) in fields {
                    hash.insert((*field).to_string(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            None => Ok(()),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => {
                hash.remove(field);
                Ok(())
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_increment_within(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        min: i64,
        max: i64,
    ) -> Result<Option<i64>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        let hash = match live(&mut entries, key, now) {
            None => return Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => hash,
            Some(_) => return Err(wrong_type(key)),
        };
        let current: i64 = match hash.get(field) {
            Some(value) => value.parse().map_err(|_| wrong_type(key))?,
            None => 0,
        };
        let next = current + delta;
        if next < min || next > max {
            return Ok(None);
        }
        hash.insert(field.to_string(), next.to_string());
        Ok(Some(next))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.insert(member.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            None => Ok(()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.remove(member);
                Ok(())
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, now) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleachers_shared::time::ManualClock;

    fn create_test_store() -> (InMemoryKeyValueStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (InMemoryKeyValueStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_value_expires_after_ttl() {
        // テスト項目: TTL を過ぎた値は読めなくなる
        // given (前提条件):
        let (store, clock) = create_test_store();
        store
            .set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        // when (操作):
        let before = store.get("k").await.unwrap();
        clock.advance_millis(10_000);
        let after = store.get("k").await.unwrap();

        // then (期待する結果):
        assert_eq!(before, Some("v".to_string()));
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn test_set_if_absent_only_writes_once() {
        // テスト項目: set_if_absent は最初の 1 回だけ書き込み、TTL 経過後は再度書ける
        let (store, clock) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("cooldown", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("cooldown", "1", ttl).await.unwrap());
        clock.advance_millis(60_000);
        assert!(store.set_if_absent("cooldown", "1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_sets_ttl_only_on_creation() {
        // テスト項目: increment はキー作成時にだけ TTL を設定する
        let (store, clock) = create_test_store();
        let ttl = Some(Duration::from_secs(120));

        assert_eq!(store.increment("c", 1, ttl).await.unwrap(), 1);
        clock.advance_millis(60_000);
        assert_eq!(store.increment("c", 1, ttl).await.unwrap(), 2);
        clock.advance_millis(60_000);

        // 作成から 120 秒経過したので失効している
        assert_eq!(store.get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hash_increment_within_respects_bounds() {
        // テスト項目: 範囲外になる加算は適用されない
        // given (前提条件):
        let (store, _clock) = create_test_store();
        store
            .hash_set("room", &[("current", "1".to_string())])
            .await
            .unwrap();

        // when (操作):
        let up = store
            .hash_increment_within("room", "current", 1, 0, 2)
            .await
            .unwrap();
        let over = store
            .hash_increment_within("room", "current", 1, 0, 2)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(up, Some(2));
        assert_eq!(over, None);
        let fields = store.hash_get_all("room").await.unwrap();
        assert_eq!(fields.get("current"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_hash_increment_within_missing_key_is_noop() {
        // テスト項目: 存在しないハッシュには加算せず、キーも作らない
        let (store, _clock) = create_test_store();

        let result = store
            .hash_increment_within("ghost", "current", 1, 0, 10)
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(store.hash_get_all("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hash_create_does_not_overwrite() {
        // テスト項目: 既存のハッシュは hash_create で上書きされない
        let (store, _clock) = create_test_store();

        let first = store
            .hash_create("room", &[("title", "a".to_string())], None)
            .await
            .unwrap();
        let second = store
            .hash_create("room", &[("title", "b".to_string())], None)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let fields = store.hash_get_all("room").await.unwrap();
        assert_eq!(fields.get("title"), Some(&"a".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        // テスト項目: 型の異なる値への操作はエラーになる
        let (store, _clock) = create_test_store();
        store.set("plain", "v", None).await.unwrap();

        let result = store.hash_get_all("plain").await;

        assert_eq!(result, Err(StoreError::WrongType("plain".to_string())));
    }

    #[tokio::test]
    async fn test_set_members_and_remove() {
        // テスト項目: セットへの追加・削除・列挙ができる
        let (store, _clock) = create_test_store();
        store.set_add("rooms", "a").await.unwrap();
        store.set_add("rooms", "b").await.unwrap();
        store.set_add("rooms", "a").await.unwrap();
        store.set_remove("rooms", "b").await.unwrap();

        assert_eq!(store.set_members("rooms").await.unwrap(), vec!["a"]);
    }
}
