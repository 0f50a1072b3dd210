/// 注册中心客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Registry returned status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
