use http::StatusCode;

use crate::services::registry::RegistryError;

// 控制面错误类型
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
    #[error("Failed to decode request: {0}")]
    Decode(String),
    #[error("Registration failed: {0}")]
    Register(RegistryError),
    #[error("Deregistration failed: {0}")]
    Deregister(RegistryError),
    #[error("Method {0} not allowed")]
    MethodNotAllowed(http::Method),
    #[error("Path not found: {0}")]
    NotFound(String),
}

impl ControlPlaneError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BodyRead(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Register(RegistryError::Decode(_)) => StatusCode::BAD_REQUEST,
            // 首次同步失败源于注册方自身的更新地址不可达
            Self::Register(RegistryError::Delivery(_)) => StatusCode::BAD_REQUEST,
            Self::Register(RegistryError::NotFound { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Deregister(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}
