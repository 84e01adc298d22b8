use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::Client as RedisClient;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{MutationKind, SessionStorage, StorageEvent, StorageKey, StoredSession};
use crate::background::{BackgroundHandle, stopped};
use crate::error::StorageError;
use crate::session::keys::{EVENTS_CHANNEL, namespaced};

/// Redis 会话存储
/// 令牌与用户资料在同一个 MULTI/EXEC 中写入，并通过 pub/sub 通知其他实例
pub struct RedisStorage {
    redis: Arc<RedisClient>,
    namespace: String,
    events: broadcast::Sender<StorageEvent>,
    // 随存储一起销毁，订阅者随后收到 Closed
    forwarder: BackgroundHandle,
}

impl RedisStorage {
    /// 连接 Redis 并启动事件订阅任务
    pub async fn connect(
        redis: Arc<RedisClient>,
        namespace: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let namespace = namespace.into();
        let (events, _) = broadcast::channel(64);

        let mut pubsub = redis.get_async_pubsub().await?;
        pubsub.subscribe(namespaced(&namespace, EVENTS_CHANNEL)).await?;

        let forward = events.clone();
        let forwarder = BackgroundHandle::spawn("redis-session-events", move |mut shutdown| {
            async move {
                let messages = pubsub.into_on_message();
                tokio::pin!(messages);
                loop {
                    tokio::select! {
                        _ = stopped(&mut shutdown) => break,
                        msg = messages.next() => match msg {
                            Some(msg) => forward_event(&forward, &msg),
                            None => break,
                        },
                    }
                }
                tracing::debug!("Storage event subscription closed");
            }
        });

        Ok(Self {
            redis,
            namespace,
            events,
            forwarder,
        })
    }

    /// 停止事件订阅任务
    pub async fn close(self) {
        self.forwarder.stop().await;
    }

    fn key(&self, key: StorageKey) -> String {
        namespaced(&self.namespace, key.as_str())
    }

    fn channel(&self) -> String {
        namespaced(&self.namespace, EVENTS_CHANNEL)
    }

    fn add_events(
        &self,
        pipe: &mut redis::Pipeline,
        origin: Uuid,
        kind: MutationKind,
    ) -> Result<(), StorageError> {
        for event in StorageEvent::for_all_keys(origin, kind) {
            let json = serde_json::to_string(&event)?;
            pipe.publish(self.channel(), json).ignore();
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for RedisStorage {
    async fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let (token, user_json): (Option<String>, Option<String>) = redis::cmd("MGET")
            .arg(self.key(StorageKey::Token))
            .arg(self.key(StorageKey::User))
            .query_async(&mut conn)
            .await?;

        match (token, user_json) {
            (Some(token), Some(user_json)) => Ok(Some(StoredSession { token, user_json })),
            (None, None) => Ok(None),
            _ => Err(StorageError::Corrupted(
                "token and user profile are out of sync".into(),
            )),
        }
    }

    async fn store(&self, origin: Uuid, record: &StoredSession) -> Result<(), StorageError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(self.key(StorageKey::Token), &record.token)
            .ignore()
            .set(self.key(StorageKey::User), &record.user_json)
            .ignore();
        self.add_events(&mut pipe, origin, MutationKind::Written)?;

        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn remove(&self, origin: Uuid) -> Result<(), StorageError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.key(StorageKey::Token))
            .ignore()
            .del(self.key(StorageKey::User))
            .ignore();
        self.add_events(&mut pipe, origin, MutationKind::Removed)?;

        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

fn forward_event(events: &broadcast::Sender<StorageEvent>, msg: &redis::Msg) {
    let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Failed to read storage event payload: {}", e);
            return;
        }
    };
    match serde_json::from_str::<StorageEvent>(&payload) {
        Ok(event) => {
            let _ = events.send(event);
        }
        Err(e) => tracing::warn!("Ignoring malformed storage event: {}", e),
    }
}
