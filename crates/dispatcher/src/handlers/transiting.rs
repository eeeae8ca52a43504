use async_trait::async_trait;
use recycler_domain::{Event, EventType, HostFilter, OrderUpdate, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::instrument;

use super::{done_update, persist, remediation_owner, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 搬迁中：运行搬迁引擎
pub struct TransitingHandler {
    deps: Arc<HandlerDeps>,
}

impl TransitingHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }

    /// 搬迁失败时只更新回收单，主机状态已由搬迁引擎逐台写入
    async fn transit_failed_update(&self, ctx: &TaskContext, message: String) -> RecycleResult<OrderUpdate> {
        let total = ctx.order.total_num;
        let failed = self
            .deps
            .store
            .list_hosts(
                &HostFilter::by_suborder(&ctx.order.suborder_id)
                    .with_status(RecycleStatus::TransitFailed),
            )
            .await?
            .len() as i32;
        let failed = if failed == 0 { total } else { failed.min(total) };

        Ok(OrderUpdate::to_status(RecycleStatus::TransitFailed)
            .with_counts(total - failed, 0, failed)
            .with_handler(remediation_owner(&self.deps.remediation, RecycleStatus::TransitFailed))
            .with_message(message))
    }
}

#[async_trait]
impl StateHandler for TransitingHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Transiting
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let event = self.deps.transit.run(&ctx.order).await?;
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        match event.event_type {
            EventType::TransitSuccess if ctx.order.skips_return() => {
                persist(&self.deps, ctx, done_update(total), true).await?;
                Ok(Requeue::Now)
            }
            EventType::TransitSuccess => {
                persist(&self.deps, ctx, working_update(RecycleStatus::Returning, total), true)
                    .await?;
                Ok(Requeue::Now)
            }
            EventType::TransitFailed => {
                let update = self.transit_failed_update(ctx, event.message()).await?;
                persist(&self.deps, ctx, update, false).await?;
                Ok(Requeue::Now)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
