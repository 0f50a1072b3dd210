use super::config::RegistryClientConfig;
use super::error::RegistryClientError;
use crate::services::registry::Registration;

/// 已注册服务使用的注册中心客户端
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryClientConfig,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(config: RegistryClientConfig) -> Result<Self, RegistryClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn with_client(config: RegistryClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub async fn register(&self, registration: &Registration) -> Result<(), RegistryClientError> {
        let response = self
            .http
            .post(&self.config.registry_url)
            .json(registration)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(
            service_name = %registration.service_name,
            service_url = %registration.service_url,
            registry_url = %self.config.registry_url,
            "Registered with registry"
        );
        Ok(())
    }

    pub async fn deregister(&self, service_url: &str) -> Result<(), RegistryClientError> {
        let response = self
            .http
            .delete(&self.config.registry_url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(service_url.to_string())
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(service_url = %service_url, "Deregistered from registry");
        Ok(())
    }

    async fn ensure_success(response: reqwest::Response) -> Result<(), RegistryClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(RegistryClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
