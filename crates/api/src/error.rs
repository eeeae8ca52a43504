use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recycler_errors::RecycleError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("回收错误: {0}")]
    Recycle(#[from] RecycleError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Recycle(err) => match err {
                RecycleError::OrderNotFound { .. } => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
                RecycleError::InvalidContext(_) => (StatusCode::CONFLICT, "INVALID_CONTEXT"),
                RecycleError::StaleStatus { .. } => (StatusCode::CONFLICT, "STALE_STATUS"),
                RecycleError::UnknownEvent { .. } => (StatusCode::CONFLICT, "UNKNOWN_EVENT"),
                RecycleError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                RecycleError::Serialization(_) => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
                RecycleError::Collaborator { .. } | RecycleError::Network(_) => {
                    (StatusCode::BAD_GATEWAY, "COLLABORATOR_ERROR")
                }
                RecycleError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = match &self {
            ApiError::Recycle(err) if status.is_server_error() => err.user_message().to_string(),
            ApiError::Internal(_) => "系统内部错误".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "data": null,
            "message": message,
            "error": {
                "type": error_type,
                "code": status.as_u16(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
