use axum::{extract::State, response::IntoResponse};

use crate::{error::ApiResult, response::success, routes::AppState};

/// 调度器队列与处理统计
pub async fn get_dispatcher_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.dispatcher.stats().await))
}
