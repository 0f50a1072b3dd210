use std::time::Duration;

/// 注册中心客户端配置
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// 注册中心控制面地址
    pub registry_url: String,
    /// 请求超时时间
    pub request_timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:8020/services".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}
