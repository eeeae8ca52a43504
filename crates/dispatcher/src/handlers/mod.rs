//! 各回收单状态的处理器

pub mod audit;
pub mod committed;
pub mod detecting;
pub mod returning;
pub mod returning_plan;
pub mod terminal;
pub mod transiting;
pub mod uncommit;

pub use audit::AuditHandler;
pub use committed::CommittedHandler;
pub use detecting::DetectingHandler;
pub use returning::ReturningHandler;
pub use returning_plan::ReturningPlanHandler;
pub use terminal::TerminalHandler;
pub use transiting::TransitingHandler;
pub use uncommit::UncommitHandler;

use recycler_config::RemediationConfig;
use recycler_domain::{OrderUpdate, RecycleStatus, Transition, AUTO_HANDLER};
use recycler_errors::{RecycleError, RecycleResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::task::{HandlerDeps, HandlerRegistry, TaskContext};

/// 注册全部状态的处理器
pub fn standard_registry(deps: Arc<HandlerDeps>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::empty(deps);
    registry.register(RecycleStatus::Uncommit, |deps| Box::new(UncommitHandler::new(deps)));
    registry.register(RecycleStatus::Committed, |deps| Box::new(CommittedHandler::new(deps)));
    registry.register(RecycleStatus::Detecting, |deps| Box::new(DetectingHandler::new(deps)));
    registry.register(RecycleStatus::Audit, |deps| Box::new(AuditHandler::new(deps)));
    registry.register(RecycleStatus::Transiting, |deps| Box::new(TransitingHandler::new(deps)));
    registry.register(RecycleStatus::Returning, |deps| Box::new(ReturningHandler::new(deps)));
    registry.register(RecycleStatus::ReturningPlan, |deps| {
        Box::new(ReturningPlanHandler::new(deps))
    });
    for status in RecycleStatus::all().iter().copied().filter(|s| s.is_terminal()) {
        registry.register(status, move |_| Box::new(TerminalHandler::new(status)));
    }
    registry
}

/// 失败、终止、驳回状态对应的处理人
pub fn remediation_owner(config: &RemediationConfig, status: RecycleStatus) -> &str {
    match status {
        RecycleStatus::DetectFailed => &config.detect_failed,
        RecycleStatus::TransitFailed => &config.transit_failed,
        RecycleStatus::ReturnFailed => &config.return_failed,
        RecycleStatus::ReturnPlanFailed => &config.return_plan_failed,
        RecycleStatus::Terminate => &config.terminate,
        RecycleStatus::Rejected => &config.rejected,
        _ => AUTO_HANDLER,
    }
}

/// 进入处理中状态：全部计为处理中
pub(crate) fn working_update(status: RecycleStatus, total: i32) -> OrderUpdate {
    OrderUpdate::to_status(status)
        .with_counts(0, total, 0)
        .with_handler(AUTO_HANDLER)
        .with_message("")
}

pub(crate) fn done_update(total: i32) -> OrderUpdate {
    OrderUpdate::to_status(RecycleStatus::Done)
        .with_counts(total, 0, 0)
        .with_handler(AUTO_HANDLER)
        .with_message("")
}

/// 失败类终态：全部计为失败，交给对应处理人
pub(crate) fn failure_update(
    deps: &HandlerDeps,
    status: RecycleStatus,
    total: i32,
    message: String,
) -> OrderUpdate {
    OrderUpdate::to_status(status)
        .with_counts(0, 0, total)
        .with_handler(remediation_owner(&deps.remediation, status))
        .with_message(message)
}

/// 以处理器构建时的状态为条件写入回收单（以及可选的全部主机）
///
/// 条件不满足说明回收单已被其他处理推进，返回 `StaleStatus` 且不写入任何内容。
pub(crate) async fn persist(
    deps: &HandlerDeps,
    ctx: &mut TaskContext,
    update: OrderUpdate,
    sync_hosts: bool,
) -> RecycleResult<()> {
    let from = ctx.order.status;
    let transition = Transition::new(&ctx.order.suborder_id, from, update.clone(), sync_hosts);
    if !deps.store.apply_transition(&transition).await? {
        return Err(RecycleError::stale_status(&ctx.order.suborder_id, from));
    }

    update.apply(&mut ctx.order);
    let to = ctx.order.status;
    deps.metrics.record_transition(from.as_str(), to.as_str());
    if to.is_failed() {
        warn!(
            suborder_id = %ctx.order.suborder_id,
            from = %from,
            to = %to,
            handler = %ctx.order.handler,
            "回收单进入失败状态，等待人工处理: {}",
            ctx.order.message
        );
    } else {
        info!(
            suborder_id = %ctx.order.suborder_id,
            from = %from,
            to = %to,
            "回收单状态流转"
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use recycler_config::{RemediationConfig, TransitConfig};
    use recycler_domain::{RecycleHost, RecycleOrder, RecycleStore, ReturnedWay};
    use recycler_infrastructure::{MemoryRecycleStore, MetricsCollector};
    use recycler_testing_utils::{
        HostBuilder, MockAlarmShield, MockDetector, MockInventoryClient, MockReturner,
        MockShortRentalNotifier, TestEnv,
    };
    use std::time::Duration;

    use crate::task::Task;
    use crate::transit::TransitEngine;

    /// 处理器单元测试的依赖组合
    pub struct Harness {
        pub store: Arc<MemoryRecycleStore>,
        pub detector: MockDetector,
        pub returner: MockReturner,
        pub inventory: MockInventoryClient,
        pub shield: MockAlarmShield,
        pub short_rental: MockShortRentalNotifier,
        pub registry: Arc<HandlerRegistry>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_mocks(
                MockDetector::new(),
                MockReturner::new(),
                MockInventoryClient::new(),
                MockShortRentalNotifier::new(),
            )
        }

        pub fn with_mocks(
            detector: MockDetector,
            returner: MockReturner,
            inventory: MockInventoryClient,
            short_rental: MockShortRentalNotifier,
        ) -> Self {
            let store = Arc::new(MemoryRecycleStore::new());
            let shield = MockAlarmShield::new();
            let metrics = Arc::new(MetricsCollector::new());
            let transit = Arc::new(TransitEngine::new(
                store.clone(),
                Arc::new(inventory.clone()),
                Arc::new(shield.clone()),
                TransitConfig {
                    hop_interval_ms: 0,
                    ..TransitConfig::default()
                },
                metrics.clone(),
            ));
            let deps = Arc::new(HandlerDeps {
                store: store.clone(),
                detector: Arc::new(detector.clone()),
                returner: Arc::new(returner.clone()),
                short_rental: Arc::new(short_rental.clone()),
                transit,
                remediation: RemediationConfig::default(),
                returning_poll_interval: Duration::from_secs(300),
                detect_step_count: 4,
                metrics,
            });
            Self {
                store,
                detector,
                returner,
                inventory,
                shield,
                short_rental,
                registry: Arc::new(standard_registry(deps)),
            }
        }

        pub async fn seed(&self, order: &RecycleOrder, hosts: usize) -> Vec<RecycleHost> {
            let hosts = HostBuilder::many(order, hosts as i64, ReturnedWay::ProviderReturn);
            TestEnv::seed(self.store.as_ref(), order, &hosts).await.unwrap();
            hosts
        }

        pub async fn task(&self, suborder_id: &str) -> Task {
            let order = self.store.get_order(suborder_id).await.unwrap().unwrap();
            self.registry.select(TaskContext::new(order)).unwrap()
        }

        pub async fn order(&self, suborder_id: &str) -> RecycleOrder {
            self.store.get_order(suborder_id).await.unwrap().unwrap()
        }

        pub async fn hosts(&self, suborder_id: &str) -> Vec<RecycleHost> {
            self.store
                .list_hosts(&recycler_domain::HostFilter::by_suborder(suborder_id))
                .await
                .unwrap()
        }
    }
}
