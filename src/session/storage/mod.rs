// 会话持久化存储
// 多个客户端实例共享同一份存储，写入方通过事件通知其他实例

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StorageError;
use crate::session::keys::{TOKEN_KEY, USER_KEY};

pub use memory::MemoryStorage;
pub use redis_store::RedisStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKey {
    Token,
    User,
}

impl StorageKey {
    pub const ALL: [StorageKey; 2] = [StorageKey::Token, StorageKey::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => TOKEN_KEY,
            StorageKey::User => USER_KEY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Written,
    Removed,
}

/// 存储变更事件，`origin` 为写入方实例 ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub origin: Uuid,
    pub key: StorageKey,
    pub kind: MutationKind,
}

impl StorageEvent {
    pub(crate) fn for_all_keys(origin: Uuid, kind: MutationKind) -> Vec<StorageEvent> {
        StorageKey::ALL
            .into_iter()
            .map(|key| StorageEvent { origin, key, kind })
            .collect()
    }
}

/// 持久化后的会话记录：令牌原文和用户资料 JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user_json: String,
}

#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self) -> Result<Option<StoredSession>, StorageError>;

    /// 原子写入令牌与用户资料
    async fn store(&self, origin: Uuid, record: &StoredSession) -> Result<(), StorageError>;

    /// 原子删除令牌与用户资料
    async fn remove(&self, origin: Uuid) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}
