use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::UserProfile;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// 登录、注册、刷新接口的响应
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

/// 第三方登录窗口回传的消息
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum OAuthMessage {
    #[serde(rename = "oauth_success")]
    Success { token: String, user: UserProfile },
    /// 窗口在完成前被关闭
    #[serde(rename = "oauth_cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Apple => "apple",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Apple => "Apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "apple" => Ok(OAuthProvider::Apple),
            other => Err(format!("unsupported oauth provider: {}", other)),
        }
    }
}

/// 认证操作的成功结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// 后端签发的会话
    Authenticated,
    /// 后端不可达，使用本地合成的会话
    DegradedAuthenticated,
}
