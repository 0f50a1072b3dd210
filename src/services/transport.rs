use std::time::Duration;

use async_trait::async_trait;

use super::registry::{DeliveryError, Patch};

/// 注册中心对外发起的网络操作：补丁投递与心跳探测
#[async_trait]
pub trait ServiceTransport: Send + Sync + std::fmt::Debug {
    async fn send_patch(&self, update_url: &str, patch: &Patch) -> Result<(), DeliveryError>;

    async fn probe(&self, heartbeat_url: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn check_status(url: &str, response: &reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl ServiceTransport for HttpTransport {
    async fn send_patch(&self, update_url: &str, patch: &Patch) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(update_url)
            .json(patch)
            .send()
            .await
            .map_err(|e| DeliveryError::transport(update_url, e))?;

        Self::check_status(update_url, &response)
    }

    async fn probe(&self, heartbeat_url: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .get(heartbeat_url)
            .send()
            .await
            .map_err(|e| DeliveryError::transport(heartbeat_url, e))?;

        Self::check_status(heartbeat_url, &response)
    }
}
