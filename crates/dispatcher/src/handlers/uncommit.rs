use async_trait::async_trait;
use recycler_domain::{Event, EventType, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{persist, working_update};
use crate::task::{HandlerDeps, Requeue, StateHandler, TaskContext};

/// 提交：初始化计数，回收单与主机进入 Committed
pub struct UncommitHandler {
    deps: Arc<HandlerDeps>,
}

impl UncommitHandler {
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StateHandler for UncommitHandler {
    fn name(&self) -> RecycleStatus {
        RecycleStatus::Uncommit
    }

    #[instrument(skip(self, ctx), fields(suborder_id = %ctx.order.suborder_id))]
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        let hosts = self.deps.hosts(ctx).await?;
        if hosts.is_empty() {
            return Err(RecycleError::invalid_context(format!(
                "回收单 {} 没有待回收主机",
                ctx.order.suborder_id
            )));
        }
        debug!("提交回收单，主机数 {}", hosts.len());
        self.advance(ctx, Event::new(EventType::Commit)).await
    }

    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        match event.event_type {
            EventType::Commit => {
                let total = self.deps.hosts(ctx).await?.len() as i32;
                let update = working_update(RecycleStatus::Committed, total).with_total(total);
                persist(&self.deps, ctx, update, true).await?;
                Ok(Requeue::Now)
            }
            other => Err(RecycleError::unknown_event(self.name(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Harness;
    use recycler_domain::{RecycleStore, AUTO_HANDLER};
    use recycler_testing_utils::OrderBuilder;

    #[tokio::test]
    async fn test_commit_initialises_counts() {
        let h = Harness::new();
        h.seed(&OrderBuilder::new("SUB-1").build(), 3).await;

        let requeue = h.task("SUB-1").await.execute().await.unwrap();
        assert_eq!(requeue, Requeue::Now);

        let order = h.order("SUB-1").await;
        assert_eq!(order.status, RecycleStatus::Committed);
        assert_eq!((order.total_num, order.pending_num), (3, 3));
        assert_eq!(order.handler, AUTO_HANDLER);
        assert!(h
            .hosts("SUB-1")
            .await
            .iter()
            .all(|host| host.status == RecycleStatus::Committed));
    }

    #[tokio::test]
    async fn test_commit_without_hosts_fails_fast() {
        let h = Harness::new();
        h.store
            .create_order(&OrderBuilder::new("EMPTY").build())
            .await
            .unwrap();

        let err = h.task("EMPTY").await.execute().await.unwrap_err();
        assert!(matches!(err, RecycleError::InvalidContext(_)));
        assert_eq!(h.order("EMPTY").await.status, RecycleStatus::Uncommit);
    }

    #[tokio::test]
    async fn test_unknown_event_not_persisted() {
        let h = Harness::new();
        h.seed(&OrderBuilder::new("SUB-1").build(), 1).await;
        let handler = UncommitHandler::new(h.registry.deps().clone());
        let mut ctx = h.task("SUB-1").await.into_context();

        let err = handler
            .advance(&mut ctx, Event::new(EventType::DetectSuccess))
            .await
            .unwrap_err();
        assert!(matches!(err, RecycleError::UnknownEvent { .. }));
        assert_eq!(h.order("SUB-1").await.status, RecycleStatus::Uncommit);
    }
}
