pub mod error;
pub mod response;

pub use error::ControlPlaneError;

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tower::Service;

use crate::services::heartbeat::HeartbeatMonitor;
use crate::services::registry::{Registration, RegistrationStore};
use response::{ResponseBody, create_error_response, ok_response, text_response};

pub const SERVICES_PATH: &str = "/services";
pub const HEALTH_PATH: &str = "/health";

/// 注册中心控制面：注册 / 注销
#[derive(Debug, Clone)]
pub struct ControlPlane {
    store: Arc<RegistrationStore>,
    monitor: Option<Arc<HeartbeatMonitor>>,
}

impl ControlPlane {
    pub fn new(store: Arc<RegistrationStore>) -> Self {
        Self {
            store,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<HeartbeatMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        tracing::info!(method = %method, path = %path, "Control plane request");

        let result = match (path.as_str(), &method) {
            (SERVICES_PATH, &Method::POST) => self.register(req.into_body()).await,
            (SERVICES_PATH, &Method::DELETE) => self.deregister(req.into_body()).await,
            (HEALTH_PATH, &Method::GET) => return text_response(StatusCode::OK, "ok"),
            (SERVICES_PATH, _) | (HEALTH_PATH, _) => {
                Err(ControlPlaneError::MethodNotAllowed(method.clone()))
            }
            _ => Err(ControlPlaneError::NotFound(path.clone())),
        };

        match result {
            Ok(response) => response,
            Err(e) => create_error_response(&e),
        }
    }

    async fn register<B>(&self, body: B) -> Result<Response<ResponseBody>, ControlPlaneError>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let payload = read_body(body).await?;
        let registration = Registration::from_json(&payload)
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))?;

        tracing::info!(
            service_name = %registration.service_name,
            service_url = %registration.service_url,
            "Adding service"
        );

        self.store
            .add(registration)
            .await
            .map_err(ControlPlaneError::Register)?;

        Ok(ok_response())
    }

    async fn deregister<B>(&self, body: B) -> Result<Response<ResponseBody>, ControlPlaneError>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let payload = read_body(body).await?;
        let service_url = std::str::from_utf8(&payload)
            .map_err(|e| ControlPlaneError::Decode(format!("service URL is not UTF-8: {e}")))?
            .trim()
            .to_string();
        if service_url.is_empty() {
            return Err(ControlPlaneError::Decode("service URL must not be empty".into()));
        }

        tracing::info!(service_url = %service_url, "Removing service");

        // 主动注销的服务不应被心跳探测重新加入
        if let Some(ref monitor) = self.monitor {
            monitor.forget(&service_url);
        }

        self.store
            .remove(&service_url)
            .await
            .map_err(ControlPlaneError::Deregister)?;

        Ok(ok_response())
    }
}

async fn read_body<B>(body: B) -> Result<Bytes, ControlPlaneError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ControlPlaneError::BodyRead(e.to_string()))
}

impl<B> Service<Request<B>> for ControlPlane
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display,
{
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let control_plane = self.clone();
        Box::pin(async move { Ok(control_plane.handle(req).await) })
    }
}
