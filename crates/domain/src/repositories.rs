//! 回收单存储抽象
//!
//! 过滤读、过滤原子更新，以及回收单与主机在一次状态流转中的原子写入

use async_trait::async_trait;
use chrono::Utc;
use recycler_errors::RecycleResult;

use crate::entities::{DetectTask, RecycleHost, RecycleOrder};
use crate::value_objects::{RecycleStage, RecycleStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub suborder_id: Option<String>,
    pub order_id: Option<i64>,
    /// 为空表示不按状态过滤
    pub statuses: Vec<RecycleStatus>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    pub fn by_suborder<S: Into<String>>(suborder_id: S) -> Self {
        Self {
            suborder_id: Some(suborder_id.into()),
            ..Default::default()
        }
    }

    /// 带状态条件的单号过滤，用于比较并更新
    pub fn by_suborder_in_status<S: Into<String>>(suborder_id: S, status: RecycleStatus) -> Self {
        Self {
            suborder_id: Some(suborder_id.into()),
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<RecycleStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn matches(&self, order: &RecycleOrder) -> bool {
        if let Some(suborder_id) = &self.suborder_id {
            if &order.suborder_id != suborder_id {
                return false;
            }
        }
        if let Some(order_id) = self.order_id {
            if order.order_id != order_id {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&order.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub stage: Option<RecycleStage>,
    pub status: Option<RecycleStatus>,
    pub message: Option<String>,
    pub handler: Option<String>,
    pub remark: Option<String>,
    pub total_num: Option<i32>,
    pub success_num: Option<i32>,
    pub pending_num: Option<i32>,
    pub failed_num: Option<i32>,
}

impl OrderUpdate {
    /// 切换到新状态，阶段随状态推导
    pub fn to_status(status: RecycleStatus) -> Self {
        Self {
            stage: Some(status.stage()),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_handler<S: Into<String>>(mut self, handler: S) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_remark<S: Into<String>>(mut self, remark: S) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn with_counts(mut self, success: i32, pending: i32, failed: i32) -> Self {
        self.success_num = Some(success);
        self.pending_num = Some(pending);
        self.failed_num = Some(failed);
        self
    }

    pub fn with_total(mut self, total: i32) -> Self {
        self.total_num = Some(total);
        self
    }

    pub fn apply(&self, order: &mut RecycleOrder) {
        if let Some(stage) = self.stage {
            order.stage = stage;
        }
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(message) = &self.message {
            order.message = message.clone();
        }
        if let Some(handler) = &self.handler {
            order.handler = handler.clone();
        }
        if let Some(remark) = &self.remark {
            order.remark = remark.clone();
        }
        if let Some(total) = self.total_num {
            order.total_num = total;
        }
        if let Some(success) = self.success_num {
            order.success_num = success;
        }
        if let Some(pending) = self.pending_num {
            order.pending_num = pending;
        }
        if let Some(failed) = self.failed_num {
            order.failed_num = failed;
        }
        order.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostFilter {
    pub suborder_id: Option<String>,
    /// 为空表示不按主机过滤
    pub host_ids: Vec<i64>,
    pub status: Option<RecycleStatus>,
}

impl HostFilter {
    pub fn by_suborder<S: Into<String>>(suborder_id: S) -> Self {
        Self {
            suborder_id: Some(suborder_id.into()),
            ..Default::default()
        }
    }

    pub fn with_host_ids(mut self, host_ids: Vec<i64>) -> Self {
        self.host_ids = host_ids;
        self
    }

    pub fn with_status(mut self, status: RecycleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, host: &RecycleHost) -> bool {
        if let Some(suborder_id) = &self.suborder_id {
            if &host.suborder_id != suborder_id {
                return false;
            }
        }
        if !self.host_ids.is_empty() && !self.host_ids.contains(&host.host_id) {
            return false;
        }
        match self.status {
            Some(status) => host.status == status,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostUpdate {
    pub stage: RecycleStage,
    pub status: RecycleStatus,
}

impl HostUpdate {
    pub fn to_status(status: RecycleStatus) -> Self {
        Self {
            stage: status.stage(),
            status,
        }
    }

    pub fn apply(&self, host: &mut RecycleHost) {
        host.stage = self.stage;
        host.status = self.status;
        host.updated_at = Utc::now();
    }
}

/// 一次状态流转：带条件的回收单更新，以及可选的主机同步更新
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub order_filter: OrderFilter,
    pub order_update: OrderUpdate,
    pub hosts: Option<(HostFilter, HostUpdate)>,
}

impl Transition {
    /// 回收单从 `from` 切换到 `update` 描述的状态；`sync_hosts` 时该单全部主机同步切换
    pub fn new(suborder_id: &str, from: RecycleStatus, update: OrderUpdate, sync_hosts: bool) -> Self {
        let hosts = match (sync_hosts, update.status) {
            (true, Some(status)) => Some((
                HostFilter::by_suborder(suborder_id),
                HostUpdate::to_status(status),
            )),
            _ => None,
        };
        Self {
            order_filter: OrderFilter::by_suborder_in_status(suborder_id, from),
            order_update: update,
            hosts,
        }
    }
}

#[async_trait]
pub trait RecycleStore: Send + Sync {
    async fn create_order(&self, order: &RecycleOrder) -> RecycleResult<()>;
    async fn get_order(&self, suborder_id: &str) -> RecycleResult<Option<RecycleOrder>>;
    async fn list_orders(&self, filter: &OrderFilter) -> RecycleResult<Vec<RecycleOrder>>;
    /// 返回受影响的行数
    async fn update_order(&self, filter: &OrderFilter, update: &OrderUpdate) -> RecycleResult<u64>;
    async fn create_hosts(&self, hosts: &[RecycleHost]) -> RecycleResult<()>;
    /// 原子地写入回收单及其主机；任一写入失败时两者都不落库
    async fn create_order_with_hosts(
        &self,
        order: &RecycleOrder,
        hosts: &[RecycleHost],
    ) -> RecycleResult<()>;
    async fn list_hosts(&self, filter: &HostFilter) -> RecycleResult<Vec<RecycleHost>>;
    async fn update_hosts(&self, filter: &HostFilter, update: &HostUpdate) -> RecycleResult<u64>;
    async fn create_detect_tasks(&self, tasks: &[DetectTask]) -> RecycleResult<()>;
    async fn list_detect_tasks(&self, suborder_id: &str) -> RecycleResult<Vec<DetectTask>>;
    /// 原子地写入回收单与主机；回收单条件不满足时不做任何修改并返回 false
    async fn apply_transition(&self, transition: &Transition) -> RecycleResult<bool>;
}
