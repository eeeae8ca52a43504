//! # Recycler API
//!
//! 回收单的 REST 接口，基于 Axum。
//!
//! - `GET /health` 健康检查
//! - `POST /api/orders` 创建回收单（Uncommit）
//! - `GET /api/orders/{suborder_id}` 查询回收单
//! - `GET /api/orders/{suborder_id}/hosts` 查询回收单主机
//! - `POST /api/orders/{suborder_id}/commit` 提交回收单
//! - `POST /api/orders/{suborder_id}/audit` 提交审核结论 `{approval, remark}`
//! - `GET /api/dispatcher/stats` 调度器统计
//!
//! 成功响应统一为 `{success, data, message, timestamp}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use recycler_dispatcher::OrderController;
use std::sync::Arc;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(controller: Arc<OrderController>) -> Router {
    let state = AppState {
        dispatcher: Arc::clone(controller.dispatcher()),
        controller,
    };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
