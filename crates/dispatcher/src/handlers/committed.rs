use async_trait::async_trait;
use recycler_domain::{DetectTask, Event, EventType, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{failure_update, persist, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 已提交：为每台主机创建检测任务
pub struct CommittedHandler {
    deps: Arc<HandlerDeps>,
}

impl CommittedHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }

    async fn create_detect_tasks(&self, ctx: &mut TaskContext) -> RecycleResult<()> {
        let existing = self
            .deps
            .store
            .list_detect_tasks(&ctx.order.suborder_id)
            .await?;
        if !existing.is_empty() {
            debug!("检测任务已存在 {} 个，跳过创建", existing.len());
            return Ok(());
        }

        let hosts = self.deps.hosts(ctx).await?;
        if hosts.is_empty() {
            return Err(RecycleError::invalid_context("回收单没有主机"));
        }
        let tasks: Vec<DetectTask> = hosts
            .iter()
            .map(|host| DetectTask::for_host(host, self.deps.detect_step_count))
            .collect();
        self.deps.store.create_detect_tasks(&tasks).await
    }
}

#[async_trait]
impl StateHandler for CommittedHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Committed
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let event = match self.create_detect_tasks(ctx).await {
            Ok(()) => Event::new(EventType::CommitSuccess),
            Err(e) => {
                warn!("创建检测任务失败: {}", e);
                Event::failed(EventType::CommitFailed, e)
            }
        };
        self.advance(ctx, event).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        let total = ctx.order.total_num;
        match event.event_type {
            EventType::CommitSuccess => {
                let update = working_update(RecycleStatus::Detecting, total);
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::Now)
            }
            EventType::CommitFailed => {
                let update =
                    failure_update(&self.deps, RecycleStatus::Terminate, total, event.message());
                persist(&self.deps, ctx, update, true).await?;
                // 终止状态的处理器为空操作，重新入队只是让该 key 正常出队
                Ok(Requeue::Now)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}
