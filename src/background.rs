use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 后台任务句柄
///
/// `stop` 发出停止信号并等待任务退出；直接丢弃句柄会中止任务。
pub struct BackgroundHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl BackgroundHandle {
    pub(crate) fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(body(shutdown_rx));
        tracing::debug!("Background task {} started", name);
        Self {
            name,
            shutdown,
            task: Some(task),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Background task {} ended abnormally: {}", self.name, e);
            }
        }
        tracing::debug!("Background task {} stopped", self.name);
    }
}

impl Drop for BackgroundHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// 等待停止信号，发送端被丢弃也视为停止
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
