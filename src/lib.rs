use std::sync::Arc;

use redis::Client as RedisClient;
use uuid::Uuid;

pub mod access;
pub mod auth;
pub mod background;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod refresh;
pub mod result;
pub mod session;
pub mod sync;

use access::{AccessPolicy, FeatureAccessEvaluator};
use auth::AuthGateway;
use background::BackgroundHandle;
use cache::ResponseCache;
use client::ResourceClient;
use clock::{Clock, SystemClock};
use config::Config;
use error::StorageError;
use host::ClientHost;
use refresh::RefreshScheduler;
use result::ApiResult;
use session::{MemoryStorage, RedisStorage, SessionStorage, SessionStore};
use sync::CrossInstanceSynchronizer;

/// Redis 键命名空间
const STORAGE_NAMESPACE: &str = "realtor";

/// 一个客户端实例持有的全部服务
#[derive(Clone)]
pub struct AppClient {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub cache: Arc<ResponseCache>,
    pub client: Arc<ResourceClient>,
    pub auth: Arc<AuthGateway>,
    pub access: FeatureAccessEvaluator,
    pub host: Arc<dyn ClientHost>,
}

/// 后台任务：定时刷新与多实例同步
pub struct BackgroundTasks {
    pub refresh: BackgroundHandle,
    pub sync: BackgroundHandle,
}

impl BackgroundTasks {
    pub async fn stop(self) {
        self.refresh.stop().await;
        self.sync.stop().await;
    }
}

impl AppClient {
    pub async fn build(
        config: Config,
        storage: Arc<dyn SessionStorage>,
        host: Arc<dyn ClientHost>,
    ) -> ApiResult<Self> {
        Self::build_with_clock(config, storage, host, Arc::new(SystemClock)).await
    }

    pub async fn build_with_clock(
        config: Config,
        storage: Arc<dyn SessionStorage>,
        host: Arc<dyn ClientHost>,
        clock: Arc<dyn Clock>,
    ) -> ApiResult<Self> {
        let config = Arc::new(config);
        let session = Arc::new(SessionStore::open(storage, Uuid::new_v4()).await?);
        let cache = Arc::new(ResponseCache::with_clock(
            config.cache_capacity,
            config.cache_ttl(),
            clock.clone(),
        ));
        let client = Arc::new(ResourceClient::new(
            config.clone(),
            session.clone(),
            cache.clone(),
            host.clone(),
        )?);
        let auth = Arc::new(AuthGateway::new(
            client.clone(),
            session.clone(),
            cache.clone(),
            host.clone(),
            config.clone(),
            clock,
        ));
        let access = FeatureAccessEvaluator::new(session.clone(), AccessPolicy::from_config(&config));

        Ok(Self {
            config,
            session,
            cache,
            client,
            auth,
            access,
            host,
        })
    }

    /// 按配置选择会话存储：配置了 REDIS_URL 时使用 Redis，否则使用进程内存储
    pub async fn connect_storage(config: &Config) -> Result<Arc<dyn SessionStorage>, StorageError> {
        match &config.redis_url {
            Some(url) => {
                let redis = Arc::new(RedisClient::open(url.as_str())?);
                let storage = RedisStorage::connect(redis, STORAGE_NAMESPACE).await?;
                tracing::info!("Using redis session storage");
                Ok(Arc::new(storage))
            }
            None => {
                tracing::info!("Using in-memory session storage");
                Ok(Arc::new(MemoryStorage::new()))
            }
        }
    }

    pub fn start_background(&self) -> BackgroundTasks {
        BackgroundTasks {
            refresh: RefreshScheduler::spawn(self.auth.clone(), self.config.refresh_interval()),
            sync: CrossInstanceSynchronizer::spawn(
                self.session.clone(),
                self.cache.clone(),
                self.host.clone(),
            ),
        }
    }
}
