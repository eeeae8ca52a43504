//! 回收单调度器
//!
//! 固定数量的 worker 从共享工作队列取出子单号，按回收单当前持久化状态选出处理器执行，
//! 再根据处理器给出的 [`Requeue`] 决定是否重新入队。

use futures::future::join_all;
use futures::FutureExt;
use recycler_config::DispatcherConfig;
use recycler_domain::{OrderFilter, RecycleStatus, RecycleStore};
use recycler_errors::RecycleResult;
use recycler_infrastructure::MetricsCollector;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::task::{HandlerRegistry, Requeue, TaskContext};
use crate::work_queue::WorkQueue;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DispatcherStats {
    pub queue_len: usize,
    pub processing: usize,
    pub workers: usize,
    pub processed_total: u64,
    pub failed_total: u64,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Arc<WorkQueue>,
    store: Arc<dyn RecycleStore>,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<MetricsCollector>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<HandlerRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let queue = Arc::new(WorkQueue::new(config.queue_qps, config.queue_burst));
        Self::with_queue(config, queue, registry, metrics)
    }

    pub fn with_queue(
        config: DispatcherConfig,
        queue: Arc<WorkQueue>,
        registry: Arc<HandlerRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let store = Arc::clone(&registry.deps().store);
        Self {
            config,
            queue,
            store,
            registry,
            metrics,
            workers: Mutex::new(Vec::new()),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub async fn add(&self, suborder_id: &str) {
        self.queue.add(suborder_id).await;
        self.metrics.set_queue_depth(self.queue.len().await);
    }

    pub fn add_after(&self, suborder_id: &str, delay: Duration) {
        self.queue.add_after(suborder_id, delay);
    }

    /// 按处理器给出的决定重新入队
    pub async fn requeue(&self, suborder_id: &str, requeue: Requeue) {
        match requeue {
            Requeue::No => {}
            Requeue::Now => self.add(suborder_id).await,
            Requeue::After(delay) => {
                debug!(suborder_id, "{:?} 后重新入队", delay);
                self.add_after(suborder_id, delay);
            }
        }
    }

    /// 启动 worker，重复调用不会再次启动
    pub async fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock().await;
        if !workers.is_empty() {
            warn!("调度器已经启动");
            return;
        }
        for worker_id in 0..self.config.worker_count {
            let dispatcher = Arc::clone(self);
            workers.push(tokio::spawn(async move {
                debug!(worker_id, "worker 启动");
                while dispatcher.process_next().await {}
                debug!(worker_id, "worker 退出");
            }));
        }
        info!("调度器已启动，worker 数量: {}", self.config.worker_count);
    }

    /// 取出并处理一个子单号；队列关闭后返回 false
    pub async fn process_next(&self) -> bool {
        let Some(suborder_id) = self.queue.pop().await else {
            return false;
        };
        self.metrics.set_queue_depth(self.queue.len().await);

        let outcome = AssertUnwindSafe(self.process(&suborder_id))
            .catch_unwind()
            .await;
        self.queue.done(&suborder_id).await;

        match outcome {
            Ok(Ok(requeue)) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                self.requeue(&suborder_id, requeue).await;
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_dispatch_error();
                error!(suborder_id = %suborder_id, "处理回收单失败: {}", e);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_dispatch_error();
                error!(suborder_id = %suborder_id, "处理回收单时发生 panic");
            }
        }
        true
    }

    async fn process(&self, suborder_id: &str) -> RecycleResult<Requeue> {
        let Some(order) = self.store.get_order(suborder_id).await? else {
            warn!(suborder_id, "回收单不存在，丢弃");
            return Ok(Requeue::No);
        };
        debug!(suborder_id, "开始处理{}", order.entity_description());
        let mut task = self.registry.select(TaskContext::new(order))?;
        task.execute().await
    }

    /// 处理当前已在队列中的全部子单号（不等待延迟入队），返回处理数量
    pub async fn run_once(&self) -> usize {
        let mut handled = 0;
        while !self.queue.is_empty().await {
            if !self.process_next().await {
                break;
            }
            handled += 1;
        }
        handled
    }

    /// 重新入队重启前未完成的回收单
    pub async fn resume_pending(&self) -> RecycleResult<usize> {
        let statuses: Vec<RecycleStatus> = RecycleStatus::all()
            .iter()
            .copied()
            .filter(|s| s.is_resumable())
            .collect();
        let orders = self
            .store
            .list_orders(&OrderFilter::default().with_statuses(statuses))
            .await?;
        for order in &orders {
            self.add(&order.suborder_id).await;
        }
        info!("恢复未完成回收单 {} 个", orders.len());
        Ok(orders.len())
    }

    /// 停止发放新的子单号，并在超时内等待处理中的回收单结束
    pub async fn shutdown(&self, timeout: Duration) {
        self.queue.shutdown().await;
        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        if workers.is_empty() {
            return;
        }
        match tokio::time::timeout(timeout, join_all(workers)).await {
            Ok(_) => info!("调度器已停止"),
            Err(_) => warn!("等待 worker 退出超时 ({:?})", timeout),
        }
    }

    pub async fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            queue_len: self.queue.len().await,
            processing: self.queue.processing_len().await,
            workers: self.workers.lock().await.len(),
            processed_total: self.processed.load(Ordering::Relaxed),
            failed_total: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Harness;
    use recycler_domain::ResourceType;
    use recycler_testing_utils::OrderBuilder;

    fn dispatcher(h: &Harness) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::with_queue(
            DispatcherConfig {
                worker_count: 2,
                ..DispatcherConfig::default()
            },
            Arc::new(WorkQueue::unlimited()),
            Arc::clone(&h.registry),
            Arc::new(MetricsCollector::new()),
        ))
    }

    #[tokio::test]
    async fn test_missing_order_is_dropped() {
        let h = Harness::new();
        let d = dispatcher(&h);
        d.add("GHOST").await;

        assert_eq!(d.run_once().await, 1);
        let stats = d.stats().await;
        assert_eq!(stats.processed_total, 1);
        assert_eq!(stats.failed_total, 0);
        assert!(!d.queue().is_queued("GHOST").await);
    }

    #[tokio::test]
    async fn test_run_until_done() {
        let h = Harness::new();
        let order = OrderBuilder::new("OT-1")
            .with_resource_type(ResourceType::Other)
            .with_status(RecycleStatus::Committed)
            .with_total(3)
            .build();
        h.seed(&order, 3).await;
        let d = dispatcher(&h);
        d.add("OT-1").await;

        // Committed -> Detecting -> Transiting -> Done -> 终态空转
        assert_eq!(d.run_once().await, 4);
        assert_eq!(h.order("OT-1").await.status, RecycleStatus::Done);
        assert!(d.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_worker() {
        let h = Harness::new();
        let broken = OrderBuilder::new("EMPTY").build();
        h.store.create_order(&broken).await.unwrap();
        let d = dispatcher(&h);
        d.add("EMPTY").await;

        assert_eq!(d.run_once().await, 1);
        assert_eq!(d.stats().await.failed_total, 1);
        assert_eq!(h.order("EMPTY").await.status, RecycleStatus::Uncommit);
        assert!(!d.queue().is_processing("EMPTY").await);
    }

    #[tokio::test]
    async fn test_resume_pending_skips_audit_and_terminal() {
        let h = Harness::new();
        for (key, status) in [
            ("R-1", RecycleStatus::Returning),
            ("R-2", RecycleStatus::Audit),
            ("R-3", RecycleStatus::Done),
            ("R-4", RecycleStatus::Detecting),
            ("R-5", RecycleStatus::Uncommit),
        ] {
            h.seed(&OrderBuilder::new(key).with_status(status).with_total(1).build(), 1)
                .await;
        }
        let d = dispatcher(&h);

        assert_eq!(d.resume_pending().await.unwrap(), 2);
        assert!(d.queue().is_queued("R-1").await);
        assert!(d.queue().is_queued("R-4").await);
        assert!(!d.queue().is_queued("R-2").await);
    }

    #[tokio::test]
    async fn test_shutdown_with_backlog_executes_nothing_more() {
        let h = Harness::new();
        let d = dispatcher(&h);
        for key in ["B-1", "B-2"] {
            let order = OrderBuilder::new(key)
                .with_resource_type(ResourceType::Other)
                .with_status(RecycleStatus::Committed)
                .with_total(1)
                .build();
            h.seed(&order, 1).await;
            d.add(key).await;
        }

        d.shutdown(Duration::from_secs(1)).await;
        assert!(!d.process_next().await);
        assert_eq!(d.run_once().await, 0);

        d.start().await;
        d.shutdown(Duration::from_secs(1)).await;

        for key in ["B-1", "B-2"] {
            assert_eq!(h.order(key).await.status, RecycleStatus::Committed);
        }
        let stats = d.stats().await;
        assert_eq!(stats.queue_len, 2);
        assert_eq!(stats.processed_total, 0);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let h = Harness::new();
        let d = dispatcher(&h);
        d.start().await;
        d.start().await;
        assert_eq!(d.stats().await.workers, 2);

        d.shutdown(Duration::from_secs(1)).await;
        assert!(d.queue().is_shutting_down().await);
        assert_eq!(d.stats().await.workers, 0);
    }
}
