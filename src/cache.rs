use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// External TTL cache in front of the read endpoints. Every operation
/// degrades gracefully: a dead cache means recomputing, never failing
/// the request.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

/// Response wrapper for cache-backed endpoints. `cached` tells the
/// client whether it got a stored copy, and `cache_time` when that copy
/// was served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cached<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<String>,
}

impl<T> Cached<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            cached: None,
            cache_time: None,
        }
    }

    pub fn from_cache(data: T) -> Self {
        Self {
            data,
            cached: Some(true),
            cache_time: Some(Utc::now().to_rfc3339()),
        }
    }
}

impl RedisCache {
    pub fn connect(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Namespaced key like `emoji:trending:100`.
    pub fn create_key(namespace: &str, parts: &[&str]) -> String {
        let mut key = namespace.to_string();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// Lookup that treats any cache failure as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(key, error = %e, "cache unavailable, treating as miss");
                return None;
            }
        };
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "cached payload did not deserialize, dropping");
                None
            }
        }
    }

    /// Store with a TTL. A failed write is logged and swallowed; the
    /// caller already has the fresh value to serve.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache payload");
                return;
            }
        };
        match self.connection().await {
            Ok(mut conn) => {
                let result: Result<(), RedisError> =
                    conn.set_ex(key, raw, ttl_seconds as usize).await;
                if let Err(e) = result {
                    warn!(key, error = %e, "cache write failed");
                } else {
                    debug!(key, ttl_seconds, "cached");
                }
            }
            Err(e) => warn!(key, error = %e, "cache unavailable, skipping write"),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool, RedisError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Delete every key under a prefix with cursor SCAN, never KEYS; the
    /// cache is shared and KEYS blocks it.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, RedisError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let count: i64 = conn.del(&keys).await?;
                removed += count as u64;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        debug!(prefix, removed, "invalidated cache prefix");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_colon_joined() {
        assert_eq!(
            RedisCache::create_key("emoji:trending", &["100"]),
            "emoji:trending:100"
        );
        assert_eq!(
            RedisCache::create_key("launch:holders", &["0xfa1", "top-5"]),
            "launch:holders:0xfa1:top-5"
        );
        assert_eq!(RedisCache::create_key("apt:price", &[]), "apt:price");
    }

    #[test]
    fn cached_wrapper_flattens_payload() {
        #[derive(Serialize)]
        struct Payload {
            value: u32,
        }
        let fresh = Cached::fresh(Payload { value: 7 });
        let json = serde_json::to_value(&fresh).unwrap();
        assert_eq!(json["value"], 7);
        assert!(json.get("cached").is_none());

        let stored = Cached::from_cache(Payload { value: 7 });
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["cached"], true);
        assert!(json["cache_time"].is_string());
    }
}
