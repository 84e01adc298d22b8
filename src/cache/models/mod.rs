// 缓存数据模型
use chrono::{DateTime, Utc};
use serde_json::Value;

/// 缓存的响应体及其过期时间
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
