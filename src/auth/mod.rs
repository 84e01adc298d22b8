// 认证流程
// 登录、注册、第三方登录、刷新和登出；后端不可达时进入离线模式

pub mod model;
pub mod oauth;
pub mod offline;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::ResponseCache;
use crate::client::{RequestSpec, ResourceClient};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::ClientError;
use crate::host::{ClientHost, Notice};
use crate::result::ApiResult;
use crate::session::{Provenance, Session, SessionStore, UserProfile};

pub use model::{AuthOutcome, AuthResponse, OAuthMessage, OAuthProvider};
use model::{LoginRequest, RegisterRequest};
use oauth::CallbackServer;

/// 同类操作的进行中标记，离开作用域时自动释放
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool, operation: &'static str) -> ApiResult<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            tracing::debug!("{} rejected, another one is still running", operation);
            return Err(ClientError::InFlight(operation));
        }
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ClientError::Validation("邮箱格式无效".into())),
    }
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.is_empty() {
        return Err(ClientError::Validation("请输入密码".into()));
    }
    Ok(())
}

pub struct AuthGateway {
    client: Arc<ResourceClient>,
    session: Arc<SessionStore>,
    cache: Arc<ResponseCache>,
    host: Arc<dyn ClientHost>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    login_flight: AtomicBool,
    register_flight: AtomicBool,
    refresh_flight: AtomicBool,
    oauth_flight: AtomicBool,
}

impl AuthGateway {
    pub fn new(
        client: Arc<ResourceClient>,
        session: Arc<SessionStore>,
        cache: Arc<ResponseCache>,
        host: Arc<dyn ClientHost>,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            session,
            cache,
            host,
            config,
            clock,
            login_flight: AtomicBool::new(false),
            register_flight: AtomicBool::new(false),
            refresh_flight: AtomicBool::new(false),
            oauth_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> Session {
        self.session.get()
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthOutcome> {
        let result = self.try_login(email, password).await;
        self.report(&result);
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> ApiResult<AuthOutcome> {
        validate_email(email)?;
        validate_password(password)?;
        let _flight = InFlight::enter(&self.login_flight, "login")?;

        let spec = RequestSpec::post("/auth/login").try_json(&LoginRequest {
            email: email.trim(),
            password,
        })?;
        match self.client.execute::<AuthResponse>(spec).await {
            Ok(response) => self.commit_live(response).await,
            Err(ClientError::Network(reason)) => {
                tracing::warn!("Login backend unreachable ({}), using offline session", reason);
                let identity = offline::offline_identity(
                    None,
                    email,
                    None,
                    &self.config.offline_token_secret,
                    self.clock.now(),
                )?;
                self.commit_offline(identity, None).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<AuthOutcome> {
        let result = self.try_register(name, email, password).await;
        self.report(&result);
        result
    }

    async fn try_register(&self, name: &str, email: &str, password: &str) -> ApiResult<AuthOutcome> {
        if name.trim().is_empty() {
            return Err(ClientError::Validation("请输入姓名".into()));
        }
        validate_email(email)?;
        validate_password(password)?;
        let _flight = InFlight::enter(&self.register_flight, "register")?;

        let spec = RequestSpec::post("/auth/register").try_json(&RegisterRequest {
            name: name.trim(),
            email: email.trim(),
            password,
        })?;
        match self.client.execute::<AuthResponse>(spec).await {
            Ok(response) => self.commit_live(response).await,
            Err(ClientError::Network(reason)) => {
                tracing::warn!("Register backend unreachable ({}), using offline session", reason);
                let identity = offline::offline_identity(
                    Some(name),
                    email,
                    None,
                    &self.config.offline_token_secret,
                    self.clock.now(),
                )?;
                self.commit_offline(identity, None).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn oauth_google(&self) -> ApiResult<AuthOutcome> {
        self.oauth(OAuthProvider::Google).await
    }

    pub async fn oauth_apple(&self) -> ApiResult<AuthOutcome> {
        self.oauth(OAuthProvider::Apple).await
    }

    /// 第三方登录
    ///
    /// 先探测后端；不可达时直接合成离线会话。可达时打开登录窗口，
    /// 等待同源回传的 `oauth_success` 消息，超时或窗口关闭都以失败结束。
    /// 成功后通知宿主整页重载。
    pub async fn oauth(&self, provider: OAuthProvider) -> ApiResult<AuthOutcome> {
        let result = self.try_oauth(provider).await;
        self.report(&result);
        if result.is_ok() {
            self.host.reload();
        }
        result
    }

    async fn try_oauth(&self, provider: OAuthProvider) -> ApiResult<AuthOutcome> {
        let _flight = InFlight::enter(&self.oauth_flight, "oauth")?;

        if !self.client.probe_health().await {
            tracing::warn!("Backend unreachable, using offline {} session", provider);
            let identity = offline::offline_provider_identity(
                provider,
                &self.config.offline_token_secret,
                self.clock.now(),
            )?;
            return self.commit_offline(identity, Some(provider)).await;
        }

        let server = CallbackServer::bind(oauth::expected_origin(&self.config.api_base_url)?).await?;
        let mut url = reqwest::Url::parse(
            &self
                .config
                .endpoint_url(&format!("/auth/{}", provider.as_str())),
        )
        .map_err(|e| ClientError::Validation(format!("后端地址无效: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", &server.callback_url());

        self.host
            .open_surface(url.as_str())
            .map_err(|e| ClientError::Validation(format!("无法打开登录窗口: {}", e)))?;

        match server.wait(self.config.oauth_timeout()).await? {
            OAuthMessage::Success { token, user } => {
                self.commit_live(AuthResponse { user, token }).await
            }
            OAuthMessage::Cancelled => Err(ClientError::OAuthCancelled),
        }
    }

    /// 刷新令牌，返回会话是否仍然有效
    ///
    /// 网络失败且本地已有会话时保留旧会话，视为成功。
    pub async fn refresh(&self) -> bool {
        let Ok(_flight) = InFlight::enter(&self.refresh_flight, "refresh") else {
            return false;
        };

        match self
            .client
            .execute::<AuthResponse>(RequestSpec::post("/auth/refresh"))
            .await
        {
            Ok(response) => match self.commit_live(response).await {
                Ok(_) => {
                    tracing::debug!("Session refreshed");
                    true
                }
                Err(e) => {
                    self.host.notify(&Notice::from(&e));
                    false
                }
            },
            Err(ClientError::Network(reason)) if self.session.get().is_authenticated() => {
                tracing::info!("Refresh failed offline ({}), keeping current session", reason);
                true
            }
            Err(ClientError::Network(reason)) => {
                tracing::debug!("Refresh failed offline without a session: {}", reason);
                false
            }
            // 没有会话时无需刷新
            Err(ClientError::AuthRequired) => false,
            Err(e) => {
                tracing::warn!("Refresh failed: {}", e);
                self.host.notify(&Notice::from(&e));
                false
            }
        }
    }

    pub async fn logout(&self) -> ApiResult<()> {
        let result = self.session.clear().await.map_err(ClientError::from);
        if self.config.clear_cache_on_logout {
            self.cache.invalidate_all();
        }
        if let Err(e) = &result {
            self.host.notify(&Notice::from(e));
        }
        result
    }

    async fn commit_live(&self, response: AuthResponse) -> ApiResult<AuthOutcome> {
        self.session.set(response.user, response.token).await?;
        Ok(AuthOutcome::Authenticated)
    }

    async fn commit_offline(
        &self,
        (user, token): (UserProfile, String),
        provider: Option<OAuthProvider>,
    ) -> ApiResult<AuthOutcome> {
        self.session
            .set_with_provenance(
                user,
                token,
                Provenance::Degraded {
                    provider: provider.map(|p| p.as_str().to_string()),
                },
            )
            .await?;
        Ok(AuthOutcome::DegradedAuthenticated)
    }

    /// 每次操作最多一条提示
    fn report(&self, result: &ApiResult<AuthOutcome>) {
        match result {
            Ok(AuthOutcome::Authenticated) => {}
            Ok(AuthOutcome::DegradedAuthenticated) => self
                .host
                .notify(&Notice::warning("无法连接服务器，已切换到离线模式")),
            Err(e) => self.host.notify(&Notice::from(e)),
        }
    }
}
