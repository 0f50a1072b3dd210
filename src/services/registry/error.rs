use thiserror::Error;

/// 补丁投递或心跳探测失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl DeliveryError {
    pub fn transport(url: &str, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// 注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to decode registration: {0}")]
    Decode(String),

    #[error("Service at URL {url} not found")]
    NotFound { url: String },

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
