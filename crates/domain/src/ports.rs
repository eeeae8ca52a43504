//! 外部协作系统接口
//!
//! 检测、退还、库存变更、告警屏蔽以及短租通知，实现位于基础设施层

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recycler_errors::RecycleResult;

use crate::entities::RecycleOrder;
use crate::events::Event;
use crate::value_objects::{ContainerId, ShortRentalStatus};

/// 主机健康检测
#[async_trait]
pub trait Detector: Send + Sync {
    async fn run_detection(&self, suborder_id: &str) -> RecycleResult<()>;
    /// 返回错误表示检测失败或尚未完成
    async fn check_detection_status(&self, suborder_id: &str) -> RecycleResult<()>;
}

/// 供应方退还与预测调整
#[async_trait]
pub trait Returner: Send + Sync {
    /// 产生 ReturnSuccess、ReturnFailed 或 ReturnHandling
    async fn initiate_return(&self, order: &RecycleOrder) -> Event;
    /// 产生 ReturnPlanSuccess 或 ReturnPlanFailed
    async fn adjust_forecast(&self, order: &RecycleOrder) -> Event;
}

/// 库存（CMDB）变更
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn move_hosts(
        &self,
        host_ids: &[i64],
        from: ContainerId,
        to: ContainerId,
    ) -> RecycleResult<()>;
    /// 业务下指定的待回收容器
    async fn lookup_recycle_container(&self, bk_biz_id: i64) -> RecycleResult<ContainerId>;
}

/// 监控告警屏蔽，调用方忽略失败
#[async_trait]
pub trait AlarmShieldClient: Send + Sync {
    async fn suppress(
        &self,
        ips: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RecycleResult<()>;
}

/// 关联短租记录的状态同步
#[async_trait]
pub trait ShortRentalNotifier: Send + Sync {
    async fn set_returned_status(
        &self,
        suborder_id: &str,
        status: ShortRentalStatus,
    ) -> RecycleResult<()>;
}
