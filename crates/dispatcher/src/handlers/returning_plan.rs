use async_trait::async_trait;
use recycler_domain::{Event, EventType, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::instrument;

use super::{done_update, failure_update, persist};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 调整预测：需要时调用退还系统调整预测，完成后结单
pub struct ReturningPlanHandler {
    deps: Arc<HandlerDeps>,
}

impl ReturningPlanHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StateHandler for ReturningPlanHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::ReturningPlan
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let event = if ctx.order.return_forecast {
            self.deps.returner.adjust_forecast(&ctx.order).await
        } else {
            Event::new(EventType::ReturnPlanSuccess)
        };
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        match event.event_type {
            EventType::ReturnPlanSuccess => {
                persist(&self.deps, ctx, done_update(total), true).await?;
                Ok(Requeue::No)
            }
            EventType::ReturnPlanFailed => {
                let update = failure_update(
                    &self.deps,
                    RecycleStatus::ReturnPlanFailed,
                    total,
                    event.message(),
                );
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::No)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
