// 缓存键模块
// 由请求方法、接口路径和请求体生成确定的缓存键
use serde_json::Value;

/// 生成响应缓存键
pub fn request_key(method: &str, endpoint: &str, body: Option<&Value>) -> String {
    let body = body.map(Value::to_string).unwrap_or_default();
    format!("{}:{}:{}", method.to_ascii_uppercase(), endpoint, body)
}
