use std::convert::Infallible;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tower::Service;

use super::providers::Providers;
use crate::services::registry::Patch;
use crate::services::router::response::{ResponseBody, ok_response, text_response};

/// 已注册服务对外暴露的更新与心跳接口
#[derive(Debug, Clone)]
pub struct DependencySurface {
    providers: Providers,
    update_path: String,
    heartbeat_path: String,
}

impl DependencySurface {
    pub fn new(providers: Providers) -> Self {
        Self {
            providers,
            update_path: "/services".to_string(),
            heartbeat_path: "/heartbeat".to_string(),
        }
    }

    pub fn with_paths(mut self, update_path: &str, heartbeat_path: &str) -> Self {
        self.update_path = update_path.to_string();
        self.heartbeat_path = heartbeat_path.to_string();
        self
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path();

        if path == self.heartbeat_path {
            return if req.method() == Method::GET {
                ok_response()
            } else {
                text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
            };
        }

        if path != self.update_path {
            return text_response(StatusCode::NOT_FOUND, "not found");
        }
        if req.method() != Method::POST {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let payload = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read patch body");
                return text_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        let patch: Patch = match serde_json::from_slice(&payload) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(error = %e, "Received malformed patch");
                return text_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        tracing::debug!(
            added = patch.added.len(),
            removed = patch.removed.len(),
            "Applying dependency patch"
        );
        self.providers.apply(&patch);
        ok_response()
    }
}

impl<B> Service<Request<B>> for DependencySurface
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
        let surface = self.clone();
        Box::pin(async move { Ok(surface.handle(req).await) })
    }
}
