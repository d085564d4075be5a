//! 错误到HTTP响应的映射

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lis_core::LisError;
use serde_json::json;
use tracing::error;

/// HTTP层错误包装
#[derive(Debug)]
pub struct ApiError(pub LisError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LisError::Validation(_) => StatusCode::BAD_REQUEST,
            LisError::InvalidState { .. } => StatusCode::CONFLICT,
            LisError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给客户端的消息
    pub fn message(&self) -> String {
        match &self.0 {
            LisError::Validation(msg) | LisError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<LisError> for ApiError {
    fn from(err: LisError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LisError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(LisError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.message(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
