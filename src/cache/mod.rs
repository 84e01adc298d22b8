// 缓存模块
// 包含响应缓存的键、数据结构和操作逻辑

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型
pub use models::CacheEntry;
pub use operations::ResponseCache;
