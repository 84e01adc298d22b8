// 多实例会话同步
// 监听共享存储的变更事件，其他实例登出后本实例立即整页重载

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::background::{BackgroundHandle, stopped};
use crate::cache::ResponseCache;
use crate::host::ClientHost;
use crate::session::SessionStore;
use crate::session::storage::{MutationKind, StorageEvent, StorageKey};

pub struct CrossInstanceSynchronizer;

impl CrossInstanceSynchronizer {
    pub fn spawn(
        store: Arc<SessionStore>,
        cache: Arc<ResponseCache>,
        host: Arc<dyn ClientHost>,
    ) -> BackgroundHandle {
        // 在启动任务前订阅，避免漏掉事件
        let mut events = store.storage_events();
        let own = store.instance_id();

        BackgroundHandle::spawn("session-sync", move |mut shutdown| async move {
            loop {
                tokio::select! {
                    _ = stopped(&mut shutdown) => break,
                    event = events.recv() => match event {
                        Ok(event) => handle_event(&store, &cache, host.as_ref(), own, event).await,
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!("Missed {} storage events, resyncing", missed);
                            resync(&store, &cache).await;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    }
}

async fn handle_event(
    store: &SessionStore,
    cache: &ResponseCache,
    host: &dyn ClientHost,
    own: Uuid,
    event: StorageEvent,
) {
    // 只响应其他实例的写入
    if event.origin == own {
        return;
    }

    match (event.key, event.kind) {
        (StorageKey::Token, MutationKind::Removed) => {
            tracing::info!("Session removed by instance {}, reloading", event.origin);
            if let Err(e) = store.reload_from_storage().await {
                tracing::error!("Failed to reload session from storage: {}", e);
                store.invalidate_local();
            }
            cache.invalidate_all();
            host.reload();
        }
        (StorageKey::Token, MutationKind::Written) => {
            tracing::debug!("Session written by instance {}", event.origin);
            resync(store, cache).await;
        }
        // 用户资料总是和令牌一起变更
        (StorageKey::User, _) => {}
    }
}

/// 重新读取存储；换了用户时清空缓存，避免读到上一个账号的响应
async fn resync(store: &SessionStore, cache: &ResponseCache) {
    let before = store.get().user().map(|user| user.id.clone());
    match store.reload_from_storage().await {
        Ok(session) => {
            let after = session.user().map(|user| user.id.as_str());
            if before.as_deref() != after {
                tracing::info!("Signed-in user changed in another instance, clearing cache");
                cache.invalidate_all();
            }
        }
        Err(e) => tracing::warn!("Failed to resync session from storage: {}", e),
    }
}
