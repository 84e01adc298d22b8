use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Premium,
    Enterprise,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Trial,
}

/// 订阅信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub features: BTreeSet<String>,
}

impl Subscription {
    /// 有效订阅：状态为 active 或 trial
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        )
    }

    pub fn includes(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

/// 会话来源：后端签发，或后端不可达时本地合成
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Live,
    Degraded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
}

/// 用户与令牌总是成对出现
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: UserProfile,
    pub token: String,
}

/// 客户端当前的登录状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Live(Credentials),
    Degraded {
        credentials: Credentials,
        provider: Option<String>,
    },
}

impl Session {
    pub fn from_parts(user: UserProfile, token: String, provenance: Provenance) -> Self {
        let credentials = Credentials { user, token };
        match provenance {
            Provenance::Live => Session::Live(credentials),
            Provenance::Degraded { provider } => Session::Degraded {
                credentials,
                provider,
            },
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Session::Anonymous => None,
            Session::Live(credentials) => Some(credentials),
            Session::Degraded { credentials, .. } => Some(credentials),
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.credentials().map(|c| &c.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials().map(|c| c.token.as_str())
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Session::Anonymous => None,
            Session::Live(_) => Some(Provenance::Live),
            Session::Degraded { provider, .. } => Some(Provenance::Degraded {
                provider: provider.clone(),
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Session::Anonymous)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Session::Degraded { .. })
    }
}
