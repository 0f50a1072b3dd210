use std::future::Future;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::error::RegistryClientError;
use super::registry_client::RegistryClient;
use super::surface::DependencySurface;
use crate::server;
use crate::services::registry::Registration;

/// 服务启动引导：对外提供依赖更新与心跳接口，启动时注册，停止时注销
#[derive(Debug, Clone)]
pub struct ServiceHost {
    client: RegistryClient,
    registration: Registration,
    surface: DependencySurface,
}

impl ServiceHost {
    pub fn new(
        client: RegistryClient,
        registration: Registration,
        surface: DependencySurface,
    ) -> Self {
        Self {
            client,
            registration,
            surface,
        }
    }

    /// 运行直到 `shutdown` 完成。注册失败时停止监听并返回错误。
    pub async fn run<S>(self, listener: TcpListener, shutdown: S) -> Result<(), RegistryClientError>
    where
        S: Future<Output = ()> + Send,
    {
        let token = CancellationToken::new();

        // 先开始监听，注册时注册中心会立即推送已有依赖
        let server_task = tokio::spawn(server::serve(
            listener,
            self.surface.clone(),
            token.clone().cancelled_owned(),
        ));

        if let Err(e) = self.client.register(&self.registration).await {
            tracing::error!(
                service_name = %self.registration.service_name,
                error = %e,
                "Failed to register service"
            );
            token.cancel();
            let _ = server_task.await;
            return Err(e);
        }

        tracing::info!(service_name = %self.registration.service_name, "Service started");
        shutdown.await;

        let result = self.client.deregister(&self.registration.service_url).await;
        if let Err(ref e) = result {
            tracing::warn!(
                service_url = %self.registration.service_url,
                error = %e,
                "Failed to deregister service"
            );
        }

        token.cancel();
        match server_task.await {
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => tracing::error!(error = %e, "Service listener task failed"),
            Ok(Ok(())) => {}
        }

        tracing::info!(service_name = %self.registration.service_name, "Service stopped");
        result
    }
}
