use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{
    DetectTaskStatus, RecycleStage, RecycleStatus, RecycleType, ResourceType, ReturnedWay,
    AUTO_HANDLER, BULK_AUDIT_THRESHOLD,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecycleOrder {
    pub order_id: i64,
    pub suborder_id: String,
    pub bk_biz_id: i64,
    pub resource_type: ResourceType,
    pub recycle_type: RecycleType,
    pub stage: RecycleStage,
    pub status: RecycleStatus,
    pub total_num: i32,
    pub success_num: i32,
    pub pending_num: i32,
    pub failed_num: i32,
    pub return_forecast: bool,
    pub handler: String,
    pub message: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecycleOrder {
    pub fn new(
        order_id: i64,
        suborder_id: String,
        bk_biz_id: i64,
        resource_type: ResourceType,
        recycle_type: RecycleType,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            suborder_id,
            bk_biz_id,
            resource_type,
            recycle_type,
            stage: RecycleStage::Commit,
            status: RecycleStatus::Uncommit,
            total_num: 0,
            success_num: 0,
            pending_num: 0,
            failed_num: 0,
            return_forecast: false,
            handler: AUTO_HANDLER.to_string(),
            message: String::new(),
            remark: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 计数已初始化后，成功、处理中、失败之和必须等于总数
    pub fn counts_consistent(&self) -> bool {
        self.total_num == 0
            || self.success_num + self.pending_num + self.failed_num == self.total_num
    }

    /// 物理机常规回收且台数超过阈值时，检测通过后转人工审核
    pub fn needs_bulk_audit(&self) -> bool {
        self.resource_type == ResourceType::PhysicalMachine
            && self.recycle_type == RecycleType::Regular
            && self.total_num > BULK_AUDIT_THRESHOLD
    }

    /// 搬迁完成后不需要向供应方退还的回收单直接结单
    pub fn skips_return(&self) -> bool {
        match self.resource_type {
            ResourceType::Other => true,
            ResourceType::PhysicalMachine => self.recycle_type == RecycleType::Regular,
            ResourceType::Vm => false,
        }
    }

    pub fn entity_description(&self) -> String {
        format!(
            "回收单 '{}' (类型: {}/{}, 状态: {})",
            self.suborder_id, self.resource_type, self.recycle_type, self.status
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecycleHost {
    pub host_id: i64,
    pub suborder_id: String,
    pub order_id: i64,
    pub bk_biz_id: i64,
    pub ip: String,
    pub asset_id: String,
    pub returned_way: ReturnedWay,
    pub stage: RecycleStage,
    pub status: RecycleStatus,
    pub updated_at: DateTime<Utc>,
}

impl RecycleHost {
    pub fn new(order: &RecycleOrder, host_id: i64, ip: String, asset_id: String) -> Self {
        Self {
            host_id,
            suborder_id: order.suborder_id.clone(),
            order_id: order.order_id,
            bk_biz_id: order.bk_biz_id,
            ip,
            asset_id,
            returned_way: ReturnedWay::default(),
            stage: order.stage,
            status: order.status,
            updated_at: Utc::now(),
        }
    }

    pub fn with_returned_way(mut self, returned_way: ReturnedWay) -> Self {
        self.returned_way = returned_way;
        self
    }
}

/// 单台主机的检测任务，进入检测阶段时创建，之后仅由检测系统更新
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectTask {
    pub task_id: String,
    pub suborder_id: String,
    pub host_id: i64,
    pub ip: String,
    pub status: DetectTaskStatus,
    pub total_num: i32,
    pub success_num: i32,
    pub pending_num: i32,
    pub failed_num: i32,
    pub created_at: DateTime<Utc>,
}

impl DetectTask {
    /// `step_count` 为检测系统对每台主机执行的检测项数量
    pub fn for_host(host: &RecycleHost, step_count: i32) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            suborder_id: host.suborder_id.clone(),
            host_id: host.host_id,
            ip: host.ip.clone(),
            status: DetectTaskStatus::Init,
            total_num: step_count,
            success_num: 0,
            pending_num: step_count,
            failed_num: 0,
            created_at: Utc::now(),
        }
    }
}
