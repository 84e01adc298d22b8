// 定时刷新令牌

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

use crate::auth::AuthGateway;
use crate::background::{BackgroundHandle, stopped};

#[async_trait]
pub trait Refresher: Send + Sync {
    fn has_session(&self) -> bool;

    async fn refresh(&self) -> bool;
}

#[async_trait]
impl Refresher for AuthGateway {
    fn has_session(&self) -> bool {
        self.session().is_authenticated()
    }

    async fn refresh(&self) -> bool {
        AuthGateway::refresh(self).await
    }
}

pub struct RefreshScheduler;

impl RefreshScheduler {
    /// 启动时若已有会话立即刷新一次，之后按固定间隔刷新
    pub fn spawn(refresher: Arc<dyn Refresher>, interval: Duration) -> BackgroundHandle {
        BackgroundHandle::spawn("refresh", move |mut shutdown| async move {
            if refresher.has_session() {
                let refreshed = refresher.refresh().await;
                tracing::debug!("Startup refresh finished: {}", refreshed);
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stopped(&mut shutdown) => break,
                    _ = ticker.tick() => {
                        if !refresher.has_session() {
                            tracing::debug!("No session, skipping scheduled refresh");
                            continue;
                        }
                        let refreshed = refresher.refresh().await;
                        tracing::debug!("Scheduled refresh finished: {}", refreshed);
                    }
                }
            }
        })
    }
}
