use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{MutationKind, SessionStorage, StorageEvent, StoredSession};
use crate::error::StorageError;

/// 进程内存储，多个实例共享同一个 `Arc<MemoryStorage>` 即可模拟多窗口
pub struct MemoryStorage {
    record: Mutex<Option<StoredSession>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            record: Mutex::new(None),
            events,
        }
    }

    fn publish(&self, origin: Uuid, kind: MutationKind) {
        for event in StorageEvent::for_all_keys(origin, kind) {
            // 没有订阅者时发送失败，忽略即可
            let _ = self.events.send(event);
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        Ok(self.record.lock().clone())
    }

    async fn store(&self, origin: Uuid, record: &StoredSession) -> Result<(), StorageError> {
        *self.record.lock() = Some(record.clone());
        self.publish(origin, MutationKind::Written);
        Ok(())
    }

    async fn remove(&self, origin: Uuid) -> Result<(), StorageError> {
        self.record.lock().take();
        self.publish(origin, MutationKind::Removed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
