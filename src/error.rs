use thiserror::Error;

/// 会话存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupted session record: {0}")]
    Corrupted(String),
}

/// 客户端统一错误类型，请求执行器从不 panic，所有失败都以它返回
#[derive(Debug, Error)]
pub enum ClientError {
    /// 本地没有令牌，请求未发出
    #[error("authentication required")]
    AuthRequired,
    /// 服务端返回 401，本地会话已被清除
    #[error("session rejected by server")]
    Auth,
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("validation error: {0}")]
    Validation(String),
    /// 同类操作仍在进行中
    #[error("{0} already in progress")]
    InFlight(&'static str),
    #[error("request aborted")]
    Aborted,
    #[error("oauth window closed before completing")]
    OAuthCancelled,
    #[error("oauth flow timed out")]
    OAuthTimeout,
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
    /// 离线令牌签发失败
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ClientError {
    /// 面向用户的提示文案，每个失败路径对应一条
    pub fn user_message(&self) -> String {
        match self {
            ClientError::AuthRequired => "请先登录后再继续操作".into(),
            ClientError::Auth => "登录已过期，请重新登录".into(),
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Network(_) => "网络连接失败，请检查网络后重试".into(),
            ClientError::Validation(message) => message.clone(),
            ClientError::InFlight(_) => "操作正在进行中，请稍候".into(),
            ClientError::Aborted => "请求已取消".into(),
            ClientError::OAuthCancelled => "第三方登录已取消".into(),
            ClientError::OAuthTimeout => "第三方登录超时，请重试".into(),
            ClientError::Storage(_) => "保存登录状态失败".into(),
            ClientError::Token(_) => "生成离线登录凭证失败".into(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}
