// 功能权限判断
// 纯同步判断，只读取当前会话的订阅信息

use std::sync::Arc;

use crate::config::Config;
use crate::session::{Role, Session, SessionStore};

/// 已知的功能标识，标识集合是开放的
pub mod features {
    pub const LEAD_GENERATION: &str = "lead-generation";
    pub const DOCUMENT_MANAGEMENT: &str = "document-management";
    pub const PROPERTY_MATCHING: &str = "property-matching";
    pub const CLIENT_COMMUNICATION: &str = "client-communication";
    pub const CONTENT_CREATION: &str = "content-creation";

    pub const ALL: [&str; 5] = [
        LEAD_GENERATION,
        DOCUMENT_MANAGEMENT,
        PROPERTY_MATCHING,
        CLIENT_COMMUNICATION,
        CONTENT_CREATION,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// 离线合成的会话是否可以使用付费功能
    pub degraded_grants_features: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            degraded_grants_features: true,
        }
    }
}

impl AccessPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            degraded_grants_features: config.degraded_grants_features,
        }
    }
}

pub fn is_authenticated(session: &Session) -> bool {
    session.user().is_some()
}

pub fn has_active_subscription(session: &Session) -> bool {
    session
        .user()
        .and_then(|user| user.subscription.as_ref())
        .is_some_and(|subscription| subscription.is_active())
}

pub fn has_feature_access(session: &Session, policy: AccessPolicy, feature: &str) -> bool {
    if session.is_degraded() && !policy.degraded_grants_features {
        return false;
    }
    has_active_subscription(session)
        && session
            .user()
            .and_then(|user| user.subscription.as_ref())
            .is_some_and(|subscription| subscription.includes(feature))
}

/// 绑定到会话持有者的权限判断
#[derive(Clone)]
pub struct FeatureAccessEvaluator {
    session: Arc<SessionStore>,
    policy: AccessPolicy,
}

impl FeatureAccessEvaluator {
    pub fn new(session: Arc<SessionStore>, policy: AccessPolicy) -> Self {
        Self { session, policy }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn is_authenticated(&self) -> bool {
        is_authenticated(&self.session.get())
    }

    pub fn has_active_subscription(&self) -> bool {
        has_active_subscription(&self.session.get())
    }

    pub fn has_feature_access(&self, feature: &str) -> bool {
        has_feature_access(&self.session.get(), self.policy, feature)
    }

    pub fn is_admin(&self) -> bool {
        self.session
            .get()
            .user()
            .is_some_and(|user| user.role == Role::Admin)
    }
}
