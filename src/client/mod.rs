// 通用请求执行器
// 负责注入令牌、读缓存、分类响应，失败一律以 ClientError 返回

pub mod request;

use std::sync::Arc;

use futures_util::future::{AbortRegistration, Abortable};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::ClientError;
use crate::host::{ClientHost, Notice};
use crate::result::{ApiResult, error_message};
use crate::session::SessionStore;

pub use request::RequestSpec;

pub struct ResourceClient {
    http: reqwest::Client,
    config: Arc<Config>,
    session: Arc<SessionStore>,
    cache: Arc<ResponseCache>,
    host: Arc<dyn ClientHost>,
}

impl ResourceClient {
    pub fn new(
        config: Arc<Config>,
        session: Arc<SessionStore>,
        cache: Arc<ResponseCache>,
        host: Arc<dyn ClientHost>,
    ) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            config,
            session,
            cache,
            host,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// 执行请求，失败时向宿主发出一条提示
    pub async fn request<T: DeserializeOwned>(&self, spec: RequestSpec) -> ApiResult<T> {
        let result = self.execute(spec).await;
        if let Err(e) = &result {
            self.host.notify(&Notice::from(e));
        }
        result
    }

    /// 可由调用方中止的请求
    ///
    /// 中止后返回 `ClientError::Aborted` 且不发提示，调用方已经不再关心结果。
    pub async fn request_abortable<T: DeserializeOwned>(
        &self,
        spec: RequestSpec,
        registration: AbortRegistration,
    ) -> ApiResult<T> {
        match Abortable::new(self.execute(spec), registration).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.host.notify(&Notice::from(&e));
                Err(e)
            }
            Err(_) => {
                tracing::debug!("Request aborted by caller");
                Err(ClientError::Aborted)
            }
        }
    }

    /// 与 `request` 相同但不发提示，认证流程自行决定提示内容
    pub(crate) async fn execute<T: DeserializeOwned>(&self, spec: RequestSpec) -> ApiResult<T> {
        let token = self.session.get().token().map(str::to_owned);
        if token.is_none() && spec.requires_token() {
            tracing::debug!("No token for {} {}, request skipped", spec.method, spec.endpoint);
            return Err(ClientError::AuthRequired);
        }

        let cache_key = spec.cacheable.then(|| {
            ResponseCache::compute_key(spec.method.as_str(), &spec.endpoint, spec.body.as_ref())
        });
        if let Some(key) = &cache_key {
            if let Some(value) = self.cache.get(key) {
                return decode(value);
            }
        }

        let value = self.send(&spec, token.as_deref()).await?;
        if let Some(key) = cache_key {
            self.cache.put_default(key, value.clone());
        }
        decode(value)
    }

    async fn send(&self, spec: &RequestSpec, token: Option<&str>) -> ApiResult<Value> {
        let url = self.config.endpoint_url(&spec.endpoint);
        let mut builder = self.http.request(spec.method.clone(), &url);

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if spec.method != Method::GET {
            if let Some(body) = &spec.body {
                builder = builder.json(body);
            }
        }

        tracing::debug!("{} {}", spec.method, spec.endpoint);
        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Request to {} failed: {}", spec.endpoint, e);
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if status.is_success() {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&body).map_err(|e| {
                tracing::warn!("Malformed response from {}: {}", spec.endpoint, e);
                ClientError::Api {
                    status: status.as_u16(),
                    message: "服务器响应格式错误".into(),
                }
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("{} returned 401, clearing session", spec.endpoint);
            // 先清除会话，再把错误交给调用方
            if let Err(e) = self.session.clear().await {
                tracing::error!("Failed to clear session after 401: {}", e);
            }
            // 缓存键不含用户身份，会话失效时一并清空
            if self.config.clear_cache_on_logout {
                self.cache.invalidate_all();
            }
            return Err(ClientError::Auth);
        }

        let message = error_message(status.as_u16(), &body);
        tracing::debug!("{} returned {}: {}", spec.endpoint, status, message);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// 探测后端是否可达，只要收到响应即视为可达
    pub async fn probe_health(&self) -> bool {
        match self.http.get(self.config.endpoint_url("/health")).send().await {
            Ok(response) => {
                tracing::debug!("Health probe answered with {}", response.status());
                true
            }
            Err(e) => {
                tracing::warn!("Health probe failed: {}", e);
                false
            }
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Api {
        status: StatusCode::OK.as_u16(),
        message: format!("服务器响应格式错误: {}", e),
    })
}
