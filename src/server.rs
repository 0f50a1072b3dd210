use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower::Service;

use crate::config::Config;
use crate::services::heartbeat::HeartbeatMonitor;
use crate::services::registry::RegistrationStore;
use crate::services::router::ControlPlane;
use crate::services::router::response::ResponseBody;
use crate::services::transport::{HttpTransport, ServiceTransport};

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let transport: Arc<dyn ServiceTransport> =
        Arc::new(HttpTransport::new(config.request_timeout())?);

    // 初始化服务注册表
    let store = Arc::new(RegistrationStore::new(transport.clone()));

    // 启动心跳监控
    let monitor = Arc::new(HeartbeatMonitor::new(
        store.clone(),
        transport,
        config.heartbeat_config(),
    ));
    monitor.start();

    let control_plane = ControlPlane::new(store.clone()).with_monitor(monitor);

    let listener = TcpListener::bind(&config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "Registry server listening");

    serve(listener, control_plane, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    tracing::info!("Shutting down registry service");
    // 等待已派发的补丁投递结束
    store.broadcaster().flush().await;

    Ok(())
}

/// 在 `listener` 上以 HTTP/1 提供 `service`，直到 `shutdown` 完成
pub async fn serve<S, F>(listener: TcpListener, service: S, shutdown: F) -> std::io::Result<()>
where
    S: Service<Request<Incoming>, Response = Response<ResponseBody>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(addr = ?listener.local_addr().ok(), "Listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!(error = %e, "Error accepting connection");
                        continue;
                    }
                };

                let service = TowerToHyperService::new(service.clone());
                tokio::spawn(async move {
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(peer = %addr, error = %e, "Error serving connection");
                    }
                });
            }
        }
    }
}
