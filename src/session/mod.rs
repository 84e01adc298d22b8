// 会话模块
// 包含会话数据结构、持久化存储和会话持有者

pub mod keys;
pub mod models;
pub mod storage;
pub mod store;

pub use models::{
    Credentials, Plan, Provenance, Role, Session, Subscription, SubscriptionStatus, UserProfile,
};
pub use storage::{MemoryStorage, RedisStorage, SessionStorage, StorageEvent};
pub use store::SessionStore;
