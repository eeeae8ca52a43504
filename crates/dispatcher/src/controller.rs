use recycler_domain::{
    AuditDecision, HostFilter, RecycleHost, RecycleOrder, RecycleStage, RecycleStatus,
    RecycleStore,
};
use recycler_errors::{RecycleError, RecycleResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::dispatcher::Dispatcher;
use crate::task::{Task, TaskContext};

/// 回收单的外部入口：创建、提交与人工审核
pub struct OrderController {
    store: Arc<dyn RecycleStore>,
    dispatcher: Arc<Dispatcher>,
}

impl OrderController {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store: Arc::clone(&dispatcher.registry().deps().store),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// 以 Uncommit 状态创建回收单及其主机，计数在提交时初始化
    #[instrument(skip_all, fields(suborder_id = %order.suborder_id))]
    pub async fn create_order(
        &self,
        mut order: RecycleOrder,
        mut hosts: Vec<RecycleHost>,
    ) -> RecycleResult<RecycleOrder> {
        if order.suborder_id.trim().is_empty() {
            return Err(RecycleError::validation_error("子单号不能为空"));
        }
        if hosts.is_empty() {
            return Err(RecycleError::validation_error("回收单至少需要一台主机"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = hosts.iter().find(|h| !seen.insert(h.host_id)) {
            return Err(RecycleError::validation_error(format!(
                "主机 {} 重复",
                dup.host_id
            )));
        }

        order.stage = RecycleStage::Commit;
        order.status = RecycleStatus::Uncommit;
        order.total_num = 0;
        order.success_num = 0;
        order.pending_num = 0;
        order.failed_num = 0;
        for host in &mut hosts {
            host.suborder_id = order.suborder_id.clone();
            host.order_id = order.order_id;
            host.bk_biz_id = order.bk_biz_id;
            host.stage = order.stage;
            host.status = order.status;
        }

        self.store.create_order_with_hosts(&order, &hosts).await?;
        info!("创建回收单，主机 {} 台", hosts.len());
        Ok(order)
    }

    pub async fn get_order(&self, suborder_id: &str) -> RecycleResult<RecycleOrder> {
        self.store
            .get_order(suborder_id)
            .await?
            .ok_or_else(|| RecycleError::order_not_found(suborder_id))
    }

    pub async fn list_hosts(&self, suborder_id: &str) -> RecycleResult<Vec<RecycleHost>> {
        self.get_order(suborder_id).await?;
        self.store
            .list_hosts(&HostFilter::by_suborder(suborder_id))
            .await
    }

    /// 提交回收单：在调用方中执行 Uncommit 处理器，随后交给调度器
    #[instrument(skip(self))]
    pub async fn commit_order(&self, suborder_id: &str) -> RecycleResult<RecycleOrder> {
        let order = self.get_order(suborder_id).await?;
        self.run(RecycleStatus::Uncommit, TaskContext::new(order))
            .await
    }

    /// 提交人工审核结论
    #[instrument(skip(self, remark))]
    pub async fn audit_order(
        &self,
        suborder_id: &str,
        approval: bool,
        remark: &str,
    ) -> RecycleResult<RecycleOrder> {
        let order = self.get_order(suborder_id).await?;
        let ctx = TaskContext::new(order).with_audit(AuditDecision {
            approval,
            remark: remark.to_string(),
        });
        self.run(RecycleStatus::Audit, ctx).await
    }

    /// 用指定状态的处理器执行一次；上下文状态不匹配时返回 InvalidContext
    async fn run(&self, status: RecycleStatus, ctx: TaskContext) -> RecycleResult<RecycleOrder> {
        let handler = self.dispatcher.registry().handler(status)?;
        let mut task = Task::new(handler, ctx);
        let requeue = task.execute().await?;
        let order = task.into_context().order;
        self.dispatcher.requeue(&order.suborder_id, requeue).await;
        Ok(order)
    }
}
