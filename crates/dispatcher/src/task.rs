//! 状态处理器框架
//!
//! 每个回收单状态对应一个 [`StateHandler`]；注册表按回收单当前状态选出处理器，
//! 与回收单快照一起组成一次 [`Task`]。

use async_trait::async_trait;
use recycler_config::RemediationConfig;
use recycler_domain::{
    AuditDecision, Detector, Event, HostFilter, RecycleHost, RecycleOrder, RecycleStatus,
    RecycleStore, Returner, ShortRentalNotifier,
};
use recycler_errors::{RecycleError, RecycleResult};
use recycler_infrastructure::MetricsCollector;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::transit::TransitEngine;

/// 本轮处理结束后是否重新入队
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    No,
    Now,
    After(Duration),
}

/// 一次处理所需的上下文
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub order: RecycleOrder,
    /// 人工审核结论，仅审核入口携带
    pub audit: Option<AuditDecision>,
    /// 本轮已读取过的主机
    pub hosts: Option<Vec<RecycleHost>>,
}

impl TaskContext {
    pub fn new(order: RecycleOrder) -> Self {
        Self {
            order,
            audit: None,
            hosts: None,
        }
    }

    pub fn with_audit(mut self, decision: AuditDecision) -> Self {
        self.audit = Some(decision);
        self
    }

    pub fn suborder_id(&self) -> &str {
        &self.order.suborder_id
    }

    /// 在任何副作用之前检查上下文是否完整、是否与处理器匹配
    pub fn validate_for(&self, status: RecycleStatus) -> RecycleResult<()> {
        if self.order.suborder_id.trim().is_empty() {
            return Err(RecycleError::invalid_context("回收单子单号为空"));
        }
        if self.order.status != status {
            return Err(RecycleError::invalid_context(format!(
                "回收单 {} 当前状态为 {}，与处理器 {} 不匹配",
                self.order.suborder_id, self.order.status, status
            )));
        }
        Ok(())
    }
}

/// 处理器共享的依赖
pub struct HandlerDeps {
    pub store: Arc<dyn RecycleStore>,
    pub detector: Arc<dyn Detector>,
    pub returner: Arc<dyn Returner>,
    pub short_rental: Arc<dyn ShortRentalNotifier>,
    pub transit: Arc<TransitEngine>,
    pub remediation: RemediationConfig,
    pub returning_poll_interval: Duration,
    /// 每台主机的检测项数量，写入检测任务
    pub detect_step_count: i32,
    pub metrics: Arc<MetricsCollector>,
}

impl HandlerDeps {
    /// 读取回收单全部主机，优先使用上下文中已读取的结果
    pub async fn hosts(&self, ctx: &mut TaskContext) -> RecycleResult<Vec<RecycleHost>> {
        if let Some(hosts) = &ctx.hosts {
            return Ok(hosts.clone());
        }
        let hosts = self
            .store
            .list_hosts(&HostFilter::by_suborder(ctx.suborder_id()))
            .await?;
        ctx.hosts = Some(hosts.clone());
        Ok(hosts)
    }
}

#[async_trait]
pub trait StateHandler: Send + Sync {
    /// 处理器负责的回收单状态
    fn name(&self) -> RecycleStatus;

    /// 执行副作用并产生事件，随后调用 `advance`
    async fn execute(&self, ctx: &mut TaskContext) -> RecycleResult<Requeue>;

    /// 根据事件落库下一状态并给出入队决定
    async fn advance(&self, ctx: &mut TaskContext, event: Event) -> RecycleResult<Requeue>;
}

pub type HandlerFactory = Box<dyn Fn(Arc<HandlerDeps>) -> Box<dyn StateHandler> + Send + Sync>;

/// 状态到处理器工厂的注册表
pub struct HandlerRegistry {
    deps: Arc<HandlerDeps>,
    factories: HashMap<RecycleStatus, HandlerFactory>,
}

impl HandlerRegistry {
    /// 空注册表
    pub fn empty(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, status: RecycleStatus, factory: F)
    where
        F: Fn(Arc<HandlerDeps>) -> Box<dyn StateHandler> + Send + Sync + 'static,
    {
        self.factories.insert(status, Box::new(factory));
    }

    pub fn deps(&self) -> &Arc<HandlerDeps> {
        &self.deps
    }

    pub fn contains(&self, status: RecycleStatus) -> bool {
        self.factories.contains_key(&status)
    }

    pub fn handler(&self, status: RecycleStatus) -> RecycleResult<Box<dyn StateHandler>> {
        let factory = self.factories.get(&status).ok_or_else(|| {
            RecycleError::invalid_context(format!("状态 {status} 没有注册处理器"))
        })?;
        Ok(factory(Arc::clone(&self.deps)))
    }

    /// 按回收单当前状态选出处理器
    pub fn select(&self, ctx: TaskContext) -> RecycleResult<Task> {
        let handler = self.handler(ctx.order.status)?;
        Ok(Task::new(handler, ctx))
    }
}

/// 一次处理：处理器加上下文
pub struct Task {
    handler: Box<dyn StateHandler>,
    ctx: TaskContext,
}

impl Task {
    pub fn new(handler: Box<dyn StateHandler>, ctx: TaskContext) -> Self {
        Self { handler, ctx }
    }

    pub fn status(&self) -> RecycleStatus {
        self.handler.name()
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    pub async fn execute(&mut self) -> RecycleResult<Requeue> {
        self.ctx.validate_for(self.handler.name())?;
        self.handler.execute(&mut self.ctx).await
    }

    pub fn into_context(self) -> TaskContext {
        self.ctx
    }
}
