use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::{Provenance, Session, UserProfile};
use super::storage::{SessionStorage, StorageEvent, StoredSession};
use crate::error::StorageError;

/// 持久化时写入 `auth_user` 的内容：用户资料加来源标记
#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    #[serde(flatten)]
    user: UserProfile,
    #[serde(default)]
    provenance: Provenance,
}

/// 当前会话的持有者
///
/// 内存中保留一份快照供同步读取，所有写操作先落盘再更新快照，
/// 最后把新的会话值广播给本进程内的订阅者。
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    instance_id: Uuid,
    snapshot: RwLock<Session>,
    changes: broadcast::Sender<Session>,
}

impl SessionStore {
    /// 从持久化存储恢复会话
    pub async fn open(
        storage: Arc<dyn SessionStorage>,
        instance_id: Uuid,
    ) -> Result<Self, StorageError> {
        let session = read_session(storage.as_ref()).await?;
        let (changes, _) = broadcast::channel(32);

        if session.is_authenticated() {
            tracing::info!("Restored session for instance {}", instance_id);
        }

        Ok(Self {
            storage,
            instance_id,
            snapshot: RwLock::new(session),
            changes,
        })
    }

    pub fn get(&self) -> Session {
        self.snapshot.read().clone()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// 订阅会话变更，每次 set/clear 都会收到新的会话值
    pub fn subscribe(&self) -> broadcast::Receiver<Session> {
        self.changes.subscribe()
    }

    /// 订阅底层存储的变更事件，包括其他实例的写入
    pub fn storage_events(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage.subscribe()
    }

    pub async fn set(&self, user: UserProfile, token: String) -> Result<(), StorageError> {
        self.set_with_provenance(user, token, Provenance::Live).await
    }

    pub async fn set_with_provenance(
        &self,
        user: UserProfile,
        token: String,
        provenance: Provenance,
    ) -> Result<(), StorageError> {
        let profile = StoredProfile { user, provenance };
        let record = StoredSession {
            token,
            user_json: serde_json::to_string(&profile)?,
        };
        self.storage.store(self.instance_id, &record).await?;

        let session = Session::from_parts(profile.user, record.token, profile.provenance);
        tracing::info!(
            "Session committed for user {} (degraded: {})",
            session.user().map(|u| u.id.as_str()).unwrap_or_default(),
            session.is_degraded()
        );
        self.publish(session);
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(self.instance_id).await?;
        tracing::info!("Session cleared");
        self.publish(Session::Anonymous);
        Ok(())
    }

    /// 重新读取持久化存储，用于其他实例修改了会话之后
    pub async fn reload_from_storage(&self) -> Result<Session, StorageError> {
        let session = read_session(self.storage.as_ref()).await?;
        self.publish(session.clone());
        Ok(session)
    }

    /// 只丢弃内存快照，存储不可读时用来保证不再以登录状态运行
    pub fn invalidate_local(&self) {
        tracing::info!("Local session snapshot invalidated");
        self.publish(Session::Anonymous);
    }

    fn publish(&self, session: Session) {
        *self.snapshot.write() = session.clone();
        let _ = self.changes.send(session);
    }
}

async fn read_session(storage: &dyn SessionStorage) -> Result<Session, StorageError> {
    let record = match storage.load().await {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(Session::Anonymous),
        Err(StorageError::Corrupted(reason)) => {
            tracing::warn!("Discarding corrupted session record: {}", reason);
            return Ok(Session::Anonymous);
        }
        Err(e) => return Err(e),
    };

    match serde_json::from_str::<StoredProfile>(&record.user_json) {
        Ok(profile) => Ok(Session::from_parts(
            profile.user,
            record.token,
            profile.provenance,
        )),
        Err(e) => {
            tracing::warn!("Discarding unreadable user profile: {}", e);
            Ok(Session::Anonymous)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::models::Role;
    use crate::session::storage::MemoryStorage;

    fn user(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            name: "Agent".to_string(),
            email: format!("{}@example.com", id),
            role: Role::User,
            subscription: None,
        }
    }

    async fn open_store(storage: Arc<MemoryStorage>) -> SessionStore {
        SessionStore::open(storage, Uuid::new_v4()).await.unwrap()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = open_store(Arc::new(MemoryStorage::new())).await;

        store.set(user("u1"), "t1".into()).await.unwrap();
        let session = store.get();
        assert_eq!(session.user(), Some(&user("u1")));
        assert_eq!(session.token(), Some("t1"));

        store.clear().await.unwrap();
        let session = store.get();
        assert_eq!(session, Session::Anonymous);
        assert!(session.user().is_none());
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open_store(storage.clone()).await;
        store
            .set_with_provenance(
                user("u2"),
                "t2".into(),
                Provenance::Degraded {
                    provider: Some("google".into()),
                },
            )
            .await
            .unwrap();
        drop(store);

        let reopened = open_store(storage).await;
        match reopened.get() {
            Session::Degraded {
                credentials,
                provider,
            } => {
                assert_eq!(credentials.token, "t2");
                assert_eq!(provider.as_deref(), Some("google"));
            }
            other => panic!("unexpected session {:?}", other),
        }
    }

    #[tokio::test]
    async fn every_mutation_broadcasts_new_value() {
        let store = open_store(Arc::new(MemoryStorage::new())).await;
        let mut changes = store.subscribe();

        store.set(user("u3"), "t3".into()).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(changes.recv().await.unwrap().token(), Some("t3"));
        assert_eq!(changes.recv().await.unwrap(), Session::Anonymous);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreadable_profile_loads_as_anonymous() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .store(
                Uuid::new_v4(),
                &StoredSession {
                    token: "t".into(),
                    user_json: "not json".into(),
                },
            )
            .await
            .unwrap();

        let store = open_store(storage).await;
        assert_eq!(store.get(), Session::Anonymous);
    }
}
