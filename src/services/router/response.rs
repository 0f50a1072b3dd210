use bytes::Bytes;
use http::{Response, StatusCode, header};
use http_body_util::Full;

use super::error::ControlPlaneError;

pub type ResponseBody = Full<Bytes>;

pub fn text_response(status: StatusCode, message: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(message.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn ok_response() -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::OK;
    response
}

// 创建错误响应
pub fn create_error_response(error: &ControlPlaneError) -> Response<ResponseBody> {
    let status = error.status_code();

    if status.is_server_error() {
        tracing::error!(status = %status, error = %error, "Control plane request failed");
    } else {
        tracing::warn!(status = %status, error = %error, "Control plane request rejected");
    }

    text_response(status, error.to_string())
}
