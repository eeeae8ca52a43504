use async_trait::async_trait;
use recycler_domain::{Event, EventType, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{failure_update, persist, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 检测中：发起检测并检查结果
pub struct DetectingHandler {
    deps: Arc<HandlerDeps>,
}

impl DetectingHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }

    async fn detect(&self, suborder_id: &str) -> RecycleResult<()> {
        self.deps.detector.run_detection(suborder_id).await?;
        self.deps.detector.check_detection_status(suborder_id).await
    }
}

#[async_trait]
impl StateHandler for DetectingHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Detecting
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let event = match self.detect(&ctx.order.suborder_id).await {
            Ok(()) => Event::new(EventType::DetectSuccess),
            Err(e) => {
                warn!("主机检测失败: {}", e);
                Event::failed(EventType::DetectFailed, e)
            }
        };
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        match event.event_type {
            EventType::DetectSuccess if ctx.order.needs_bulk_audit() => {
                persist(&self.deps, ctx, working_update(RecycleStatus::Audit, total), true).await?;
                info!("回收单 {} 台数 {} 超过阈值，等待人工审核", ctx.order.suborder_id, total);
                Ok(Requeue::No)
            }
            EventType::DetectSuccess => {
                persist(&self.deps, ctx, working_update(RecycleStatus::Transiting, total), true)
                    .await?;
                Ok(Requeue::Now)
            }
            EventType::DetectFailed => {
                let update =
                    failure_update(&self.deps, RecycleStatus::DetectFailed, total, event.message());
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::Now)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
