use std::sync::Arc;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde_json::Value;

use crate::cache::keys::request_key;
use crate::cache::models::CacheEntry;
use crate::clock::{Clock, SystemClock};

/// 响应缓存操作
///
/// 超出容量时按最近最少使用淘汰，条目是否过期按注入的时钟判断。
pub struct ResponseCache {
    inner: Cache<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        Self::with_clock(max_capacity, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(max_capacity: u64, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            clock,
            default_ttl,
        }
    }

    pub fn compute_key(method: &str, endpoint: &str, body: Option<&Value>) -> String {
        request_key(method, endpoint, body)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 获取未过期的缓存值，过期条目顺带删除
    pub fn get(&self, key: &str) -> Option<Value> {
        let entry = self.inner.get(key)?;
        if entry.is_fresh(self.clock.now()) {
            tracing::debug!("Cache hit: {}", key);
            Some(entry.value)
        } else {
            tracing::debug!("Cache entry expired: {}", key);
            self.inner.invalidate(key);
            None
        }
    }

    pub fn put(&self, key: String, value: Value, ttl: Duration) {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        self.inner.insert(key, CacheEntry { value, expires_at });
    }

    /// 使用默认 TTL 缓存
    pub fn put_default(&self, key: String, value: Value) {
        self.put(key, value, self.default_ttl);
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        tracing::debug!("Response cache cleared");
    }
}
