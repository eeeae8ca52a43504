use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use recycler_domain::{RecycleHost, RecycleOrder, RecycleType, ResourceType, ReturnedWay};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    response::{created, success},
    routes::AppState,
};

/// 回收单创建请求
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_id: i64,
    pub suborder_id: String,
    pub bk_biz_id: i64,
    pub resource_type: ResourceType,
    pub recycle_type: RecycleType,
    #[serde(default)]
    pub return_forecast: bool,
    #[serde(default)]
    pub remark: String,
    pub hosts: Vec<CreateHostRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHostRequest {
    pub host_id: i64,
    pub ip: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub returned_way: ReturnedWay,
}

impl CreateOrderRequest {
    fn into_entities(self) -> (RecycleOrder, Vec<RecycleHost>) {
        let mut order = RecycleOrder::new(
            self.order_id,
            self.suborder_id,
            self.bk_biz_id,
            self.resource_type,
            self.recycle_type,
        );
        order.return_forecast = self.return_forecast;
        order.remark = self.remark;
        let hosts = self
            .hosts
            .into_iter()
            .map(|h| {
                RecycleHost::new(&order, h.host_id, h.ip, h.asset_id)
                    .with_returned_way(h.returned_way)
            })
            .collect();
        (order, hosts)
    }
}

/// 人工审核请求
#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub approval: bool,
    #[serde(default)]
    pub remark: String,
}

/// 创建回收单
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.hosts.iter().any(|h| h.ip.trim().is_empty()) {
        return Err(ApiError::BadRequest("主机 IP 不能为空".to_string()));
    }
    let (order, hosts) = request.into_entities();
    let order = state.controller.create_order(order, hosts).await?;
    Ok(created(order))
}

/// 获取回收单
pub async fn get_order(
    State(state): State<AppState>,
    Path(suborder_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.controller.get_order(&suborder_id).await?))
}

/// 获取回收单主机
pub async fn list_order_hosts(
    State(state): State<AppState>,
    Path(suborder_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.controller.list_hosts(&suborder_id).await?))
}

/// 提交回收单
pub async fn commit_order(
    State(state): State<AppState>,
    Path(suborder_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order = state.controller.commit_order(&suborder_id).await?;
    info!(suborder_id = %suborder_id, "回收单已提交");
    Ok(success(order))
}

/// 提交审核结论
pub async fn audit_order(
    State(state): State<AppState>,
    Path(suborder_id): Path<String>,
    Json(request): Json<AuditRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .controller
        .audit_order(&suborder_id, request.approval, &request.remark)
        .await?;
    info!(suborder_id = %suborder_id, approval = request.approval, "审核结论已处理");
    Ok(success(order))
}
