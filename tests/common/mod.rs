#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use realtor_client::{
    AppClient,
    clock::MockClock,
    config::Config,
    host::{ClientHost, Notice},
    session::{MemoryStorage, SessionStorage},
};
use serde::Deserialize;
use serde_json::{Value, json};

pub const LIVE_TOKEN: &str = "abc";
pub const REFRESHED_TOKEN: &str = "abc-refreshed";

#[derive(Clone, Default)]
struct BackendState {
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl BackendState {
    fn hit(&self, path: &str) -> usize {
        let mut hits = self.hits.lock();
        let count = hits.entry(path.to_string()).or_default();
        *count += 1;
        *count
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {}", LIVE_TOKEN))
}

fn live_user(email: &str, name: &str) -> Value {
    json!({ "id": "1", "name": name, "email": email, "role": "user" })
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
}

async fn login(State(state): State<BackendState>, Json(body): Json<LoginBody>) -> Response {
    state.hit("/auth/login");
    if body.email.starts_with("slow") {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if body.password != "secret" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(json!({ "user": live_user(&body.email, "A"), "token": LIVE_TOKEN })).into_response()
}

async fn register(State(state): State<BackendState>, Json(body): Json<RegisterBody>) -> Response {
    state.hit("/auth/register");
    if body.email == "taken@b.com" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "User already exists" })),
        )
            .into_response();
    }
    Json(json!({ "user": live_user(&body.email, &body.name), "token": LIVE_TOKEN }))
        .into_response()
}

async fn refresh(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    state.hit("/auth/refresh");
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "expired" }))).into_response();
    }
    Json(json!({ "user": live_user("a@b.com", "A"), "token": REFRESHED_TOKEN })).into_response()
}

async fn health(State(state): State<BackendState>) -> StatusCode {
    state.hit("/health");
    StatusCode::NO_CONTENT
}

async fn leads(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    let served = state.hit("/leads");
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "items": ["Jordan", "Casey"], "served": served })).into_response()
}

async fn expired(State(state): State<BackendState>) -> StatusCode {
    state.hit("/expired");
    StatusCode::UNAUTHORIZED
}

async fn broken(State(state): State<BackendState>) -> Response {
    state.hit("/broken");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Database unavailable" })),
    )
        .into_response()
}

async fn opaque(State(state): State<BackendState>) -> Response {
    state.hit("/opaque");
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response()
}

async fn slow(State(state): State<BackendState>) -> Json<Value> {
    state.hit("/slow");
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "done": true }))
}

async fn echo(State(state): State<BackendState>, headers: HeaderMap, body: String) -> Json<Value> {
    state.hit("/echo");
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "authorization": header("authorization"),
        "x-trace": header("x-trace"),
        "body": body,
    }))
}

/// 测试用后端，监听随机端口并统计每个接口的请求次数
pub struct FakeBackend {
    pub addr: SocketAddr,
    state: BackendState,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = BackendState::default();
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/health", get(health))
            .route("/leads", get(leads))
            .route("/expired", get(expired))
            .route("/broken", get(broken))
            .route("/opaque", get(opaque))
            .route("/slow", get(slow))
            .route("/echo", post(echo))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }
}

/// 一个没有任何服务监听的地址，请求会立即失败
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// 第三方登录窗口的模拟行为
#[derive(Clone)]
pub enum Surface {
    /// 什么也不做，等同于窗口一直开着
    Idle,
    /// 依次投递若干条消息，每条带上指定的 Origin
    Post(Vec<(String, Value)>),
    Fail,
}

/// 记录提示、重载和打开窗口请求的宿主
pub struct RecordingHost {
    notices: Mutex<Vec<Notice>>,
    reloads: Mutex<usize>,
    opened: Mutex<Vec<String>>,
    surface: Mutex<Surface>,
    responses: Arc<Mutex<Vec<u16>>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notices: Mutex::new(Vec::new()),
            reloads: Mutex::new(0),
            opened: Mutex::new(Vec::new()),
            surface: Mutex::new(Surface::Idle),
            responses: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn with_surface(surface: Surface) -> Arc<Self> {
        let host = Self::new();
        *host.surface.lock() = surface;
        host
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn reloads(&self) -> usize {
        *self.reloads.lock()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// 回调服务对每条投递消息的响应状态码
    pub fn callback_statuses(&self) -> Vec<u16> {
        self.responses.lock().clone()
    }
}

impl ClientHost for RecordingHost {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }

    fn reload(&self) {
        *self.reloads.lock() += 1;
    }

    fn open_surface(&self, url: &str) -> Result<(), String> {
        self.opened.lock().push(url.to_string());

        let messages = match self.surface.lock().clone() {
            Surface::Idle => return Ok(()),
            Surface::Fail => return Err("popup blocked".into()),
            Surface::Post(messages) => messages,
        };

        let url = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
        let redirect = url
            .query_pairs()
            .find(|(key, _)| key == "redirect_uri")
            .map(|(_, value)| value.into_owned())
            .ok_or("missing redirect_uri")?;

        let responses = self.responses.clone();
        tokio::spawn(async move {
            let http = reqwest::Client::new();
            for (origin, message) in messages {
                match http
                    .post(&redirect)
                    .header("origin", origin)
                    .json(&message)
                    .send()
                    .await
                {
                    Ok(response) => responses.lock().push(response.status().as_u16()),
                    Err(_) => responses.lock().push(0),
                }
            }
        });
        Ok(())
    }
}

pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::new(base_url);
    config.oauth_timeout_secs = 2;
    config
}

pub async fn build_client(
    config: Config,
    storage: Arc<dyn SessionStorage>,
    host: Arc<RecordingHost>,
    clock: &MockClock,
) -> AppClient {
    AppClient::build_with_clock(config, storage, host, Arc::new(clock.clone()))
        .await
        .unwrap()
}

pub async fn client_for(base_url: &str, host: Arc<RecordingHost>) -> (AppClient, MockClock) {
    let clock = MockClock::default();
    let client = build_client(
        test_config(base_url),
        Arc::new(MemoryStorage::new()),
        host,
        &clock,
    )
    .await;
    (client, clock)
}
