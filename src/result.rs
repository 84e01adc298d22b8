use serde::Deserialize;

use crate::error::ClientError;

pub type ApiResult<T> = Result<T, ClientError>;

/// 后端错误响应体，优先读取 `error` 字段
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|message| !message.trim().is_empty())
    }
}

/// 从错误响应体中提取提示信息，失败时退回到通用的状态码提示
pub(crate) fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("请求失败，状态码 {}", status))
}
