use async_trait::async_trait;
use recycler_domain::{Event, EventType, RecycleStatus, ShortRentalStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{failure_update, persist, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 退还中：向供应方发起退还，处理中则稍后再查
pub struct ReturningHandler {
    deps: Arc<HandlerDeps>,
}

impl ReturningHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StateHandler for ReturningHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Returning
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let event = self.deps.returner.initiate_return(&ctx.order).await;
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        match event.event_type {
            EventType::ReturnSuccess => {
                persist(&self.deps, ctx, working_update(RecycleStatus::ReturningPlan, total), true)
                    .await?;
                if let Err(e) = self
                    .deps
                    .short_rental
                    .set_returned_status(&ctx.order.suborder_id, ShortRentalStatus::Returned)
                    .await
                {
                    warn!("同步短租状态失败: {} - {}", ctx.order.suborder_id, e);
                }
                Ok(Requeue::Now)
            }
            EventType::ReturnFailed => {
                let update =
                    failure_update(&self.deps, RecycleStatus::ReturnFailed, total, event.message());
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::Now)
            }
            EventType::ReturnHandling => {
                debug!(
                    "退还处理中，{} 秒后重新检查",
                    self.deps.returning_poll_interval.as_secs()
                );
                Ok(Requeue::After(self.deps.returning_poll_interval))
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
