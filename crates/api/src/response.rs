use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }
    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

pub fn success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, ApiResponse::success(data))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, ApiResponse::success(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("SUB-1");

        assert!(response.success);
        assert_eq!(response.data, Some("SUB-1"));
        assert!(response.message.is_none());
        assert!(response.timestamp <= Utc::now());
    }

    #[test]
    fn test_api_response_with_message() {
        let response = ApiResponse::success_with_message(3, "已入队".to_string());
        assert_eq!(response.data, Some(3));
        assert_eq!(response.message.as_deref(), Some("已入队"));
    }

    #[test]
    fn test_api_response_serialization() {
        let json = serde_json::to_string(&ApiResponse::success("DONE")).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"data\":\"DONE\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(success("x").into_response().status(), StatusCode::OK);
        assert_eq!(created("x").into_response().status(), StatusCode::CREATED);
    }
}
