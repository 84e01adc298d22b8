/// 令牌存储键
pub const TOKEN_KEY: &str = "auth_token";

/// 用户资料存储键
pub const USER_KEY: &str = "auth_user";

/// 会话变更事件频道
pub const EVENTS_CHANNEL: &str = "auth:events";

/// 生成带命名空间的 Redis 键
pub fn namespaced(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}
