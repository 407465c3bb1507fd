//! Redis KeyValueStore 実装 (`redis-backend` feature)

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use crate::domain::{KeyValueStore, StoreError};

const INCREMENT_WITH_TTL: &str = r"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if tonumber(ARGV[2]) > 0 and redis.call('PTTL', KEYS[1]) == -1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return value
";

const HASH_INCREMENT_WITHIN: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return false
end
local next = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0') + tonumber(ARGV[2])
if next < tonumber(ARGV[3]) or next > tonumber(ARGV[4]) then
  return false
end
redis.call('HSET', KEYS[1], ARGV[1], next)
return next
";

const HASH_CREATE: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
for i = 2, #ARGV, 2 do
  redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
end
if tonumber(ARGV[1]) > 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return 1
";

fn backend(err: redis::RedisError) -> StoreError {
    if err.kind() == redis::ErrorKind::TypeError {
        StoreError::WrongType(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().max(1) as u64
}

#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    increment_with_ttl: Script,
    hash_increment_within: Script,
    hash_create: Script,
}

impl RedisKeyValueStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, StoreError> {
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(backend)?;
        Ok(Self {
            conn,
            increment_with_ttl: Script::new(INCREMENT_WITH_TTL),
            hash_increment_within: Script::new(HASH_INCREMENT_WITHIN),
            hash_create: Script::new(HASH_CREATE),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(backend)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(removed > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let applied: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(applied == 1)
    }

    async fn increment(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl.map(millis).unwrap_or(0);
        let value: i64 = self
            .increment_with_ttl
            .key(key)
            .arg(delta)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(fields)
    }

    async fn hash_create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.hash_create.key(key);
        invocation.arg(ttl.map(millis).unwrap_or(0));
        for (field, value) in fields {
            invocation.arg(*field).arg(value);
        }
        let created: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(created == 1)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        let _: i64 = cmd.query_async(&mut conn).await.map_err(backend)?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn hash_increment_within(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        min: i64,
        max: i64,
    ) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = self
            .hash_increment_within
            .key(key)
            .arg(field)
            .arg(delta)
            .arg(min)
            .arg(max)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(value)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(members)
    }
}
