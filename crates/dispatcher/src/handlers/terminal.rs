use async_trait::async_trait;
use recycler_domain::{Event, RecycleStatus};
use recycler_errors::{RecycleError, RecycleResult};
use tracing::debug;

use crate::task::{Requeue, StateHandler, TaskContext};

/// 终态处理器：不做任何事，也不访问存储
pub struct TerminalHandler {
    status: RecycleStatus,
}

impl TerminalHandler {
    pub fn new(status: RecycleStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl StateHandler for TerminalHandler {
    fn name(&self) -> RecycleStatus {
        self.status
    }

    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue> {
        debug!(suborder_id = %ctx.order.suborder_id, "回收单处于终态 {}", self.status);
        Ok(Requeue::No)
    }

    async fn advance(&self, _ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue> {
        Err(RecycleError::unknown_event(self.status, event.event_type))
    }
}
