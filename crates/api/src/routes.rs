use axum::{
    routing::{get, post},
    Router,
};
use recycler_dispatcher::{Dispatcher, OrderController};
use std::sync::Arc;

use crate::handlers::{
    dispatcher::get_dispatcher_stats,
    health::health_check,
    orders::{audit_order, commit_order, create_order, get_order, list_order_hosts},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<OrderController>,
    pub dispatcher: Arc<Dispatcher>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 回收单
        .route("/api/orders", post(create_order))
        .route("/api/orders/{suborder_id}", get(get_order))
        .route("/api/orders/{suborder_id}/hosts", get(list_order_hosts))
        .route("/api/orders/{suborder_id}/commit", post(commit_order))
        .route("/api/orders/{suborder_id}/audit", post(audit_order))
        // 调度器
        .route("/api/dispatcher/stats", get(get_dispatcher_stats))
        .with_state(state)
}
