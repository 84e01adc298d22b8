// 第三方登录回调
// 在本机回环地址上启动一个一次性的回调服务，等待登录窗口回传结果

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use axum_extra::headers::{HeaderMapExt, Origin};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::model::OAuthMessage;
use crate::error::ClientError;

pub const CALLBACK_PATH: &str = "/oauth/callback";

#[derive(Clone)]
struct CallbackState {
    expected_origin: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<OAuthMessage>>>>,
}

/// 把 Origin 头还原为 `scheme://host[:port]`
fn origin_string(origin: &Origin) -> String {
    match origin.port() {
        Some(port) => format!("{}://{}:{}", origin.scheme(), origin.hostname(), port),
        None => format!("{}://{}", origin.scheme(), origin.hostname()),
    }
}

/// 由接口地址计算期望的来源
pub fn expected_origin(api_base_url: &str) -> Result<String, ClientError> {
    let url = reqwest::Url::parse(api_base_url)
        .map_err(|e| ClientError::Validation(format!("后端地址无效: {}", e)))?;
    Ok(url.origin().ascii_serialization())
}

async fn receive_message(
    State(state): State<CallbackState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> StatusCode {
    // 只接受来自后端同源的消息
    let origin = headers.typed_get::<Origin>().map(|o| origin_string(&o));
    if origin.as_deref() != Some(&*state.expected_origin) {
        tracing::warn!("Rejected oauth message from origin {:?}", origin);
        return StatusCode::FORBIDDEN;
    }

    let message = match serde_json::from_value::<OAuthMessage>(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("Ignoring unrelated oauth message: {}", e);
            return StatusCode::UNPROCESSABLE_ENTITY;
        }
    };

    match state.sender.lock().take() {
        Some(sender) => {
            let _ = sender.send(message);
            StatusCode::OK
        }
        None => StatusCode::GONE,
    }
}

/// 回调路由，收到第一条合法消息后不再接受后续消息
pub(crate) fn callback_router(
    expected_origin: String,
    sender: oneshot::Sender<OAuthMessage>,
) -> Router {
    let state = CallbackState {
        expected_origin: expected_origin.into(),
        sender: Arc::new(Mutex::new(Some(sender))),
    };
    Router::new()
        .route(CALLBACK_PATH, post(receive_message))
        .with_state(state)
}

pub struct CallbackServer {
    addr: SocketAddr,
    receiver: oneshot::Receiver<OAuthMessage>,
    shutdown: oneshot::Sender<()>,
}

impl CallbackServer {
    pub async fn bind(expected_origin: String) -> Result<Self, ClientError> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| ClientError::Network(format!("无法启动登录回调服务: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let (sender, receiver) = oneshot::channel();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let router = callback_router(expected_origin, sender);

        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("OAuth callback server failed: {}", e);
            }
        });
        tracing::debug!("OAuth callback listening on {}", addr);

        Ok(Self {
            addr,
            receiver,
            shutdown,
        })
    }

    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.addr, CALLBACK_PATH)
    }

    /// 等待唯一一条回传消息，超时或窗口关闭都会结束等待
    pub async fn wait(self, timeout: Duration) -> Result<OAuthMessage, ClientError> {
        let outcome = tokio::time::timeout(timeout, self.receiver).await;
        let _ = self.shutdown.send(());

        match outcome {
            Ok(Ok(OAuthMessage::Cancelled)) => Err(ClientError::OAuthCancelled),
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ClientError::OAuthCancelled),
            Err(_) => Err(ClientError::OAuthTimeout),
        }
    }
}
