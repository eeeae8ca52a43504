use async_trait::async_trait;
use recycler_domain::{Event, EventType, RecycleStatus, ShortRentalStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{failure_update, persist, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 人工审核：只在携带审核结论时推进
pub struct AuditHandler {
    deps: Arc<HandlerDeps>,
}

impl AuditHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StateHandler for AuditHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Audit
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let Some(decision) = ctx.audit.clone() else {
            debug!("没有审核结论，等待人工审核");
            return Ok(Requeue::No);
        };

        let event = if decision.approval {
            Event::new(EventType::AuditApproved)
        } else {
            Event::failed(
                EventType::AuditRejected,
                format!("audit remark: {}", decision.remark),
            )
        };
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        let remark = ctx
            .audit
            .as_ref()
            .map(|d| d.remark.clone())
            .unwrap_or_default();

        match event.event_type {
            EventType::AuditApproved => {
                let update = working_update(RecycleStatus::Transiting, total).with_remark(remark);
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::Now)
            }
            EventType::AuditRejected => {
                let update =
                    failure_update(&self.deps, RecycleStatus::Rejected, total, event.message())
                        .with_remark(remark);
                persist(&self.deps, ctx, update, true).await?;

                if let Err(e) = self
                    .deps
                    .short_rental
                    .set_returned_status(&ctx.order.suborder_id, ShortRentalStatus::Terminate)
                    .await
                {
                    warn!("同步短租状态失败: {} - {}", ctx.order.suborder_id, e);
                }
                Ok(Requeue::Now)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
