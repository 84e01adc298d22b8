use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

/// 无需令牌即可访问的接口
const PUBLIC_ENDPOINTS: [&str; 2] = ["/auth/login", "/auth/register"];

/// 一次请求的描述
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub(crate) endpoint: String,
    pub(crate) method: Method,
    pub(crate) body: Option<Value>,
    pub(crate) cacheable: bool,
    pub(crate) headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.starts_with('/') {
            endpoint
        } else {
            format!("/{}", endpoint)
        };
        Self {
            endpoint,
            method,
            body: None,
            cacheable: false,
            headers: Vec::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// 序列化任意请求体
    pub fn try_json<B: Serialize>(self, body: &B) -> Result<Self, ClientError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ClientError::Validation(format!("请求内容无效: {}", e)))?;
        Ok(self.json(body))
    }

    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// 登录和注册之外的接口都要求本地已有令牌
    pub(crate) fn requires_token(&self) -> bool {
        let path = self.endpoint.split('?').next().unwrap_or_default();
        !PUBLIC_ENDPOINTS.contains(&path)
    }
}
