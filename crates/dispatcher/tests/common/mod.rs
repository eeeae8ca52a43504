//! 场景测试共用的组装

#![allow(dead_code)]

use recycler_config::{DispatcherConfig, RemediationConfig, TransitConfig};
use recycler_dispatcher::{
    standard_registry, Dispatcher, HandlerDeps, HandlerRegistry, OrderController, TransitEngine,
    WorkQueue,
};
use recycler_domain::{DetectTask, HostFilter, RecycleHost, RecycleOrder, RecycleStore};
use recycler_infrastructure::{MemoryRecycleStore, MetricsCollector};
use recycler_testing_utils::{
    MockAlarmShield, MockDetector, MockInventoryClient, MockReturner, MockShortRentalNotifier,
    TestEnv,
};
use std::sync::Arc;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Default)]
pub struct Mocks {
    pub detector: MockDetector,
    pub returner: MockReturner,
    pub inventory: MockInventoryClient,
    pub shield: MockAlarmShield,
    pub short_rental: MockShortRentalNotifier,
}

pub struct World {
    pub store: Arc<MemoryRecycleStore>,
    pub mocks: Mocks,
    pub dispatcher: Arc<Dispatcher>,
    pub controller: OrderController,
}

impl World {
    pub fn new(mocks: Mocks) -> Self {
        Self::with_registry(mocks, |_| {})
    }

    /// `customize` 可以在默认注册表上替换处理器
    pub fn with_registry<F>(mocks: Mocks, customize: F) -> Self
    where
        F: FnOnce(&mut HandlerRegistry),
    {
        Self::build(mocks, 4, customize)
    }

    pub fn build<F>(mocks: Mocks, worker_count: usize, customize: F) -> Self
    where
        F: FnOnce(&mut HandlerRegistry),
    {
        let store = Arc::new(MemoryRecycleStore::new());
        let metrics = Arc::new(MetricsCollector::new());
        let transit = Arc::new(TransitEngine::new(
            store.clone(),
            Arc::new(mocks.inventory.clone()),
            Arc::new(mocks.shield.clone()),
            TransitConfig {
                hop_interval_ms: 0,
                ..TransitConfig::default()
            },
            metrics.clone(),
        ));
        let deps = Arc::new(HandlerDeps {
            store: store.clone(),
            detector: Arc::new(mocks.detector.clone()),
            returner: Arc::new(mocks.returner.clone()),
            short_rental: Arc::new(mocks.short_rental.clone()),
            transit,
            remediation: RemediationConfig::default(),
            returning_poll_interval: POLL_INTERVAL,
            detect_step_count: 4,
            metrics: metrics.clone(),
        });
        let mut registry = standard_registry(deps);
        customize(&mut registry);

        let dispatcher = Arc::new(Dispatcher::with_queue(
            DispatcherConfig {
                worker_count,
                ..DispatcherConfig::default()
            },
            Arc::new(WorkQueue::unlimited()),
            Arc::new(registry),
            metrics,
        ));
        let controller = OrderController::new(dispatcher.clone());
        Self {
            store,
            mocks,
            dispatcher,
            controller,
        }
    }

    pub async fn seed(&self, order: &RecycleOrder, hosts: &[RecycleHost]) {
        TestEnv::seed(self.store.as_ref(), order, hosts).await.unwrap();
    }

    pub async fn order(&self, suborder_id: &str) -> RecycleOrder {
        self.store.get_order(suborder_id).await.unwrap().unwrap()
    }

    pub async fn hosts(&self, suborder_id: &str) -> Vec<RecycleHost> {
        self.store
            .list_hosts(&HostFilter::by_suborder(suborder_id))
            .await
            .unwrap()
    }

    pub async fn detect_tasks(&self, suborder_id: &str) -> Vec<DetectTask> {
        self.store.list_detect_tasks(suborder_id).await.unwrap()
    }
}
