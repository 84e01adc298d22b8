use std::env;
use std::time::Duration;

/// 离线令牌的默认签名密钥，仅用于本地合成的会话
const DEFAULT_OFFLINE_TOKEN_SECRET: &str = "realtor-client-offline";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    pub refresh_interval_secs: u64,
    pub oauth_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    pub clear_cache_on_logout: bool,
    pub degraded_grants_features: bool,
    pub offline_token_secret: String,
}

impl Config {
    /// 使用默认值构建配置，只需要提供后端地址
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Config {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            redis_url: None,
            cache_ttl_secs: 600,
            cache_capacity: 1000,
            refresh_interval_secs: 30 * 60,
            oauth_timeout_secs: 300,
            request_timeout_secs: None,
            clear_cache_on_logout: true,
            degraded_grants_features: true,
            offline_token_secret: DEFAULT_OFFLINE_TOKEN_SECRET.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let mut config = Config::new(env::var("API_BASE_URL")?);
        config.redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        if let Some(ttl) = parse_var("CACHE_TTL") {
            config.cache_ttl_secs = ttl;
        }
        if let Some(capacity) = parse_var("CACHE_CAPACITY") {
            config.cache_capacity = capacity;
        }
        if let Some(interval) = parse_var("REFRESH_INTERVAL") {
            config.refresh_interval_secs = interval;
        }
        if let Some(timeout) = parse_var("OAUTH_TIMEOUT") {
            config.oauth_timeout_secs = timeout;
        }
        config.request_timeout_secs = parse_var("REQUEST_TIMEOUT");
        if let Some(flag) = parse_var("CLEAR_CACHE_ON_LOGOUT") {
            config.clear_cache_on_logout = flag;
        }
        if let Some(flag) = parse_var("DEGRADED_GRANTS_FEATURES") {
            config.degraded_grants_features = flag;
        }
        if let Ok(secret) = env::var("OFFLINE_TOKEN_SECRET") {
            config.offline_token_secret = secret;
        }

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn oauth_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// 拼接完整的接口地址
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url,
            endpoint.trim_start_matches('/')
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim_end_matches('s').parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid value for {}, falling back to default", name);
            None
        }
    }
}
