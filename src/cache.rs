//! Two-tier cache: a bounded in-process map in front of Redis.
//!
//! Redis is optional. When it is not configured, or a Redis call fails, the
//! cache keeps working from memory and logs a warning; callers never see a
//! Redis error.
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::Cache as CacheConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    memory_hits: AtomicU64,
    redis_hits: AtomicU64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub memory_hits: u64,
    pub redis_hits: u64,
    pub memory_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheHealth {
    pub memory: bool,
    pub redis: bool,
}

pub struct Cache {
    namespace: String,
    default_ttl: Duration,
    capacity: usize,
    memory: Mutex<HashMap<String, Entry>>,
    redis: Option<ConnectionManager>,
    counters: Counters,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("namespace", &self.namespace)
            .field("capacity", &self.capacity)
            .field("redis", &self.redis.is_some())
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Memory-only cache.
    pub fn in_memory(cfg: &CacheConfig) -> Self {
        Self {
            namespace: cfg.namespace.clone(),
            default_ttl: Duration::from_secs(cfg.ttl_seconds),
            capacity: cfg.memory_capacity.max(1),
            memory: Mutex::new(HashMap::new()),
            redis: None,
            counters: Counters::default(),
        }
    }

    /// Connect to Redis when `redis_url` is non-empty; fall back to memory-only
    /// if the connection cannot be established.
    #[instrument(skip_all)]
    pub async fn connect(cfg: &CacheConfig, redis_url: &str) -> Self {
        let mut cache = Self::in_memory(cfg);
        if redis_url.trim().is_empty() {
            info!("redis not configured; cache is memory-only");
            return cache;
        }
        match Self::open_redis(redis_url).await {
            Ok(manager) => {
                info!("connected to redis");
                cache.redis = Some(manager);
            }
            Err(err) => warn!(?err, "redis unavailable; cache is memory-only"),
        }
        cache
    }

    async fn open_redis(url: &str) -> Result<ConnectionManager, CacheError> {
        let client = redis::Client::open(url)?;
        let mut manager = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;
        Ok(manager)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full = self.full_key(key);

        if let Some(raw) = self.memory_get(&full).await {
            if let Ok(v) = serde_json::from_str(&raw) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
                return Some(v);
            }
        }

        if let Some(mut conn) = self.redis.clone() {
            let res: Result<Option<String>, redis::RedisError> = conn.get(&full).await;
            match res {
                Ok(Some(raw)) => {
                    if let Ok(v) = serde_json::from_str(&raw) {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        self.counters.redis_hits.fetch_add(1, Ordering::Relaxed);
                        let pttl: Result<i64, redis::RedisError> = conn.pttl(&full).await;
                        match pttl {
                            Ok(ms) => {
                                // never outlive the Redis key
                                let lease = memory_lease(ms, self.default_ttl);
                                if !lease.is_zero() {
                                    self.memory_put(full, raw, lease).await;
                                }
                            }
                            Err(err) => warn!(?err, key = %full, "redis PTTL failed"),
                        }
                        return Some(v);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(?err, key = %full, "redis GET failed"),
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), CacheError> {
        let full = self.full_key(key);
        let ttl = ttl.unwrap_or(self.default_ttl);
        let raw = serde_json::to_string(value)?;

        if let Some(mut conn) = self.redis.clone() {
            let res: Result<(), redis::RedisError> =
                conn.set_ex(&full, raw.as_str(), ttl.as_secs().max(1)).await;
            if let Err(err) = res {
                warn!(?err, key = %full, "redis SET failed");
            }
        }
        self.memory_put(full, raw, ttl).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        let full = self.full_key(key);
        self.memory.lock().await.remove(&full);
        if let Some(mut conn) = self.redis.clone() {
            let res: Result<(), redis::RedisError> = conn.del(&full).await;
            if let Err(err) = res {
                warn!(?err, key = %full, "redis DEL failed");
            }
        }
    }

    pub async fn clear_memory(&self) {
        self.memory.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            total_requests: total,
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            redis_hits: self.counters.redis_hits.load(Ordering::Relaxed),
            memory_size: self.memory.lock().await.len(),
        }
    }

    pub async fn health(&self) -> CacheHealth {
        let redis = match self.redis.clone() {
            Some(mut conn) => redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|pong| pong == "PONG")
                .unwrap_or(false),
            None => false,
        };
        CacheHealth { memory: true, redis }
    }

    async fn memory_get(&self, full: &str) -> Option<String> {
        let mut map = self.memory.lock().await;
        match map.get(full) {
            Some(e) if e.expires_at > Instant::now() => Some(e.value.clone()),
            Some(_) => {
                map.remove(full);
                None
            }
            None => None,
        }
    }

    async fn memory_put(&self, full: String, value: String, ttl: Duration) {
        let mut map = self.memory.lock().await;
        let now = Instant::now();
        if map.len() >= self.capacity && !map.contains_key(&full) {
            map.retain(|_, e| e.expires_at > now);
            if map.len() >= self.capacity {
                // evict whatever expires soonest
                if let Some(victim) = map
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    map.remove(&victim);
                }
            }
        }
        map.insert(
            full,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

/// Memory lifetime for a value read from Redis, given the key's `PTTL`:
/// `-1` means no expiry, `-2` (or zero) means it is already gone.
fn memory_lease(pttl_ms: i64, default_ttl: Duration) -> Duration {
    match pttl_ms {
        -1 => default_ttl,
        ms if ms > 0 => Duration::from_millis(ms as u64).min(default_ttl),
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_lease_follows_redis_ttl() {
        let default = Duration::from_secs(60);
        assert_eq!(memory_lease(1_500, default), Duration::from_millis(1_500));
        assert_eq!(memory_lease(600_000, default), default);
        assert_eq!(memory_lease(-1, default), default);
        assert_eq!(memory_lease(-2, default), Duration::ZERO);
        assert_eq!(memory_lease(0, default), Duration::ZERO);
    }

    fn cfg(capacity: usize) -> CacheConfig {
        CacheConfig {
            ttl_seconds: 60,
            memory_capacity: capacity,
            namespace: "test".into(),
        }
    }

    #[tokio::test]
    async fn set_then_get_counts_memory_hit() {
        let cache = Cache::in_memory(&cfg(10));
        cache.set("k", &vec![1, 2, 3], None).await.unwrap();
        let got: Option<Vec<i32>> = cache.get("k").await;
        assert_eq!(got, Some(vec![1, 2, 3]));
        let missing: Option<Vec<i32>> = cache.get("nope").await;
        assert!(missing.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 2);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = Cache::in_memory(&cfg(10));
        cache
            .set("short", &"v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let got: Option<String> = cache.get("short").await;
        assert!(got.is_none());
        assert_eq!(cache.stats().await.memory_size, 0);
    }

    #[tokio::test]
    async fn capacity_evicts_soonest_expiring() {
        let cache = Cache::in_memory(&cfg(2));
        cache.set("a", &1, Some(Duration::from_secs(5))).await.unwrap();
        cache.set("b", &2, Some(Duration::from_secs(50))).await.unwrap();
        cache.set("c", &3, Some(Duration::from_secs(50))).await.unwrap();
        assert_eq!(cache.get::<i32>("a").await, None);
        assert_eq!(cache.get::<i32>("b").await, Some(2));
        assert_eq!(cache.get::<i32>("c").await, Some(3));
        assert_eq!(cache.stats().await.memory_size, 2);
    }

    #[tokio::test]
    async fn delete_and_type_mismatch() {
        let cache = Cache::in_memory(&cfg(10));
        cache.set("k", &"text", None).await.unwrap();
        assert_eq!(cache.get::<i64>("k").await, None);
        cache.delete("k").await;
        assert_eq!(cache.get::<String>("k").await, None);
    }

    #[tokio::test]
    async fn connect_without_url_is_memory_only() {
        let cache = Cache::connect(&cfg(10), "").await;
        let health = cache.health().await;
        assert!(health.memory);
        assert!(!health.redis);
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running (REDIS_URL)
    async fn redis_tier_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let cache = Cache::connect(&cfg(10), &url).await;
        assert!(cache.health().await.redis);
        cache.set("rt", &42u32, None).await.unwrap();
        cache.clear_memory().await;
        assert_eq!(cache.get::<u32>("rt").await, Some(42));
        assert_eq!(cache.stats().await.redis_hits, 1);
        cache.delete("rt").await;
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running (REDIS_URL)
    async fn redis_hit_does_not_outlive_key() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let cache = Cache::connect(&cfg(10), &url).await;
        assert!(cache.health().await.redis);
        cache.set("lease", &7u32, Some(Duration::from_secs(1))).await.unwrap();
        cache.clear_memory().await;
        assert_eq!(cache.get::<u32>("lease").await, Some(7));
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(cache.get::<u32>("lease").await, None);
    }
}
