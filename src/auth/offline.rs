// 离线会话合成
// 后端不可达时，根据邮箱在本地生成确定的用户资料和令牌

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::model::OAuthProvider;
use crate::access::features;
use crate::error::ClientError;
use crate::session::{Plan, Role, Subscription, SubscriptionStatus, UserProfile};

/// 离线试用期
const OFFLINE_TRIAL_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineClaims {
    pub sub: String,   // 用户ID
    pub email: String, // 邮箱
    pub name: String,  // 显示名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub offline: bool, // 离线标识
}

/// 同一邮箱总是得到同一个用户ID
pub fn offline_user_id(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let hex = format!("{:x}", digest);
    format!("offline-{}", &hex[..12])
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("user")
        .to_string()
}

/// 生成离线令牌，不含时间字段，因此对同一身份是确定的
pub fn generate_offline_token(
    claims: &OfflineClaims,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    tracing::debug!("Generating offline token for user: {}", claims.sub);
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// 合成离线用户，附带包含全部已知功能的试用订阅
///
/// 试用期从 `issued_at` 起算，相同输入总是得到相同的用户资料和令牌。
pub fn offline_identity(
    name: Option<&str>,
    email: &str,
    provider: Option<OAuthProvider>,
    secret: &str,
    issued_at: DateTime<Utc>,
) -> Result<(UserProfile, String), ClientError> {
    let email = email.trim().to_string();
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name_from_email(&email));

    let claims = OfflineClaims {
        sub: offline_user_id(&email),
        email: email.clone(),
        name: name.clone(),
        provider: provider.map(|p| p.as_str().to_string()),
        offline: true,
    };
    let token = generate_offline_token(&claims, secret)?;

    let user = UserProfile {
        id: claims.sub,
        name,
        email,
        role: Role::User,
        subscription: Some(Subscription {
            plan: Plan::Trial,
            status: SubscriptionStatus::Trial,
            expires_at: issued_at + Duration::days(OFFLINE_TRIAL_DAYS),
            features: features::ALL.iter().map(|f| f.to_string()).collect(),
        }),
    };

    Ok((user, token))
}

/// 第三方登录的离线身份
pub fn offline_provider_identity(
    provider: OAuthProvider,
    secret: &str,
    issued_at: DateTime<Utc>,
) -> Result<(UserProfile, String), ClientError> {
    let email = format!("{}.user@offline.local", provider.as_str());
    let name = format!("{} User", provider.display_name());
    offline_identity(Some(&name), &email, Some(provider), secret, issued_at)
}
