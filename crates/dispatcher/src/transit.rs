//! 主机搬迁引擎
//!
//! 按 (资源类型, 回收类型, 退还方式) 查表得到搬迁策略，主机按策略分组后逐组搬迁。
//! 搬迁成功的分组尽力屏蔽告警；失败的分组在返回前把主机标记为 TransitFailed。

use chrono::Utc;
use recycler_config::TransitConfig;
use recycler_domain::{
    AlarmShieldClient, Event, EventType, HostFilter, HostUpdate, InventoryClient, RecycleHost,
    RecycleOrder, RecycleStatus, RecycleStore, RecycleType, ResourceType, ReturnedWay,
};
use recycler_errors::RecycleResult;
use recycler_infrastructure::MetricsCollector;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransitStrategy {
    /// 搬到业务下的待回收模块
    BusinessRecycle,
    /// 搬到资源池待清理模块
    Pool,
    /// 先搬到系统中转模块，再搬到业务待回收模块
    TwoHop,
}

impl TransitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitStrategy::BusinessRecycle => "business_recycle",
            TransitStrategy::Pool => "pool",
            TransitStrategy::TwoHop => "two_hop",
        }
    }
}

impl fmt::Display for TransitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StrategyKey = (ResourceType, RecycleType, ReturnedWay);

/// 默认策略表
pub fn default_strategy_table() -> HashMap<StrategyKey, TransitStrategy> {
    let mut table = HashMap::new();
    for recycle_type in RecycleType::all() {
        for returned_way in ReturnedWay::all() {
            let vm = match returned_way {
                ReturnedWay::ProviderReturn => TransitStrategy::BusinessRecycle,
                ReturnedWay::ResourcePool => TransitStrategy::Pool,
            };
            let pm = match recycle_type {
                RecycleType::Dissolve | RecycleType::Expired => TransitStrategy::TwoHop,
                RecycleType::Regular => TransitStrategy::Pool,
            };
            table.insert((ResourceType::Vm, *recycle_type, *returned_way), vm);
            table.insert((ResourceType::PhysicalMachine, *recycle_type, *returned_way), pm);
            table.insert(
                (ResourceType::Other, *recycle_type, *returned_way),
                TransitStrategy::Pool,
            );
        }
    }
    table
}

pub struct TransitEngine {
    store: Arc<dyn RecycleStore>,
    inventory: Arc<dyn InventoryClient>,
    alarm_shield: Arc<dyn AlarmShieldClient>,
    config: TransitConfig,
    table: HashMap<StrategyKey, TransitStrategy>,
    metrics: Arc<MetricsCollector>,
}

impl TransitEngine {
    pub fn new(
        store: Arc<dyn RecycleStore>,
        inventory: Arc<dyn InventoryClient>,
        alarm_shield: Arc<dyn AlarmShieldClient>,
        config: TransitConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            inventory,
            alarm_shield,
            config,
            table: default_strategy_table(),
            metrics,
        }
    }

    pub fn strategy_for(&self, order: &RecycleOrder, host: &RecycleHost) -> TransitStrategy {
        self.table
            .get(&(order.resource_type, order.recycle_type, host.returned_way))
            .copied()
            .unwrap_or(TransitStrategy::Pool)
    }

    /// 搬迁回收单全部主机，产生 TransitSuccess 或 TransitFailed
    #[instrument(skip(self, order), fields(suborder_id = %order.suborder_id))]
    pub async fn run(&self, order: &RecycleOrder) -> RecycleResult<Event> {
        let hosts = self
            .store
            .list_hosts(&HostFilter::by_suborder(&order.suborder_id))
            .await?;
        if hosts.is_empty() {
            return Ok(Event::failed(EventType::TransitFailed, "没有需要搬迁的主机"));
        }

        let mut partitions: BTreeMap<TransitStrategy, Vec<RecycleHost>> = BTreeMap::new();
        for host in hosts {
            partitions
                .entry(self.strategy_for(order, &host))
                .or_default()
                .push(host);
        }

        let mut errors = Vec::new();
        let mut failed_hosts = 0;
        for (strategy, hosts) in partitions {
            let host_ids: Vec<i64> = hosts.iter().map(|h| h.host_id).collect();
            debug!("{} 台主机使用策略 {}", host_ids.len(), strategy);

            match self.relocate(order, strategy, &host_ids).await {
                Ok(()) => self.suppress_alarms(order, &hosts).await,
                Err(e) => {
                    warn!("回收单 {} 的 {} 台主机搬迁失败 ({}): {}", order.suborder_id, host_ids.len(), strategy, e);
                    failed_hosts += host_ids.len();
                    errors.push(format!("{strategy}: {e}"));
                    // 标记失败主机出错不能中断其余分组，回收单仍需进入 TransitFailed
                    if let Err(mark_err) = self
                        .store
                        .update_hosts(
                            &HostFilter::by_suborder(&order.suborder_id).with_host_ids(host_ids.clone()),
                            &HostUpdate::to_status(RecycleStatus::TransitFailed),
                        )
                        .await
                    {
                        error!("回收单 {} 标记搬迁失败主机出错: {}", order.suborder_id, mark_err);
                        errors.push(format!("{strategy}: 标记主机失败: {mark_err}"));
                    }
                }
            }
        }

        if errors.is_empty() {
            info!("回收单 {} 主机搬迁完成", order.suborder_id);
            Ok(Event::new(EventType::TransitSuccess))
        } else {
            self.metrics.record_transit_failed_hosts(failed_hosts);
            Ok(Event::failed(EventType::TransitFailed, errors.join("; ")))
        }
    }

    async fn relocate(
        &self,
        order: &RecycleOrder,
        strategy: TransitStrategy,
        host_ids: &[i64],
    ) -> RecycleResult<()> {
        let biz = order.bk_biz_id;
        match strategy {
            TransitStrategy::BusinessRecycle => {
                let target = self.inventory.lookup_recycle_container(biz).await?;
                self.inventory.move_hosts(host_ids, biz, target).await
            }
            TransitStrategy::Pool => {
                self.inventory
                    .move_hosts(host_ids, biz, self.config.pool_container_id)
                    .await
            }
            TransitStrategy::TwoHop => {
                let transit = self.config.system_transit_container_id;
                self.inventory.move_hosts(host_ids, biz, transit).await?;
                tokio::time::sleep(Duration::from_millis(self.config.hop_interval_ms)).await;
                let target = self.inventory.lookup_recycle_container(biz).await?;
                self.inventory.move_hosts(host_ids, transit, target).await
            }
        }
    }

    /// 告警屏蔽失败只记录日志
    async fn suppress_alarms(&self, order: &RecycleOrder, hosts: &[RecycleHost]) {
        let ips: Vec<String> = hosts.iter().map(|h| h.ip.clone()).collect();
        let start = Utc::now();
        let end = start + chrono::Duration::hours(self.config.alarm_shield_window_hours);
        if let Err(e) = self.alarm_shield.suppress(&ips, start, end).await {
            warn!("回收单 {} 告警屏蔽失败: {}", order.suborder_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recycler_domain::{DetectTask, OrderFilter, OrderUpdate, Transition};
    use recycler_errors::RecycleError;
    use recycler_infrastructure::MemoryRecycleStore;
    use recycler_testing_utils::{
        HostBuilder, HostMove, MockAlarmShield, MockInventoryClient, OrderBuilder, TestEnv,
    };

    struct Fixture {
        store: Arc<MemoryRecycleStore>,
        inventory: MockInventoryClient,
        shield: MockAlarmShield,
        engine: TransitEngine,
    }

    fn config() -> TransitConfig {
        TransitConfig {
            pool_container_id: 900,
            system_transit_container_id: 901,
            hop_interval_ms: 0,
            alarm_shield_window_hours: 2,
        }
    }

    fn fixture(inventory: MockInventoryClient, shield: MockAlarmShield) -> Fixture {
        fixture_with(inventory, shield, config())
    }

    fn fixture_with(
        inventory: MockInventoryClient,
        shield: MockAlarmShield,
        config: TransitConfig,
    ) -> Fixture {
        let store = Arc::new(MemoryRecycleStore::new());
        let engine = TransitEngine::new(
            store.clone(),
            Arc::new(inventory.clone()),
            Arc::new(shield.clone()),
            config,
            Arc::new(MetricsCollector::new()),
        );
        Fixture {
            store,
            inventory,
            shield,
            engine,
        }
    }

    /// 主机批量更新总是失败的存储，其余操作交给内存存储
    struct HostUpdatesFail(Arc<MemoryRecycleStore>);

    #[async_trait]
    impl RecycleStore for HostUpdatesFail {
        async fn create_order(&self, order: &RecycleOrder) -> RecycleResult<()> {
            self.0.create_order(order).await
        }
        async fn get_order(&self, suborder_id: &str) -> RecycleResult<Option<RecycleOrder>> {
            self.0.get_order(suborder_id).await
        }
        async fn list_orders(&self, filter: &OrderFilter) -> RecycleResult<Vec<RecycleOrder>> {
            self.0.list_orders(filter).await
        }
        async fn update_order(&self, filter: &OrderFilter, update: &OrderUpdate) -> RecycleResult<u64> {
            self.0.update_order(filter, update).await
        }
        async fn create_hosts(&self, hosts: &[RecycleHost]) -> RecycleResult<()> {
            self.0.create_hosts(hosts).await
        }
        async fn create_order_with_hosts(
            &self,
            order: &RecycleOrder,
            hosts: &[RecycleHost],
        ) -> RecycleResult<()> {
            self.0.create_order_with_hosts(order, hosts).await
        }
        async fn list_hosts(&self, filter: &HostFilter) -> RecycleResult<Vec<RecycleHost>> {
            self.0.list_hosts(filter).await
        }
        async fn update_hosts(&self, _filter: &HostFilter, _update: &HostUpdate) -> RecycleResult<u64> {
            Err(RecycleError::database_error("host table locked"))
        }
        async fn create_detect_tasks(&self, tasks: &[DetectTask]) -> RecycleResult<()> {
            self.0.create_detect_tasks(tasks).await
        }
        async fn list_detect_tasks(&self, suborder_id: &str) -> RecycleResult<Vec<DetectTask>> {
            self.0.list_detect_tasks(suborder_id).await
        }
        async fn apply_transition(&self, transition: &Transition) -> RecycleResult<bool> {
            self.0.apply_transition(transition).await
        }
    }

    #[test]
    fn test_strategy_table() {
        let table = default_strategy_table();
        assert_eq!(table.len(), 3 * 3 * 2);
        assert_eq!(
            table[&(ResourceType::Vm, RecycleType::Expired, ReturnedWay::ProviderReturn)],
            TransitStrategy::BusinessRecycle
        );
        assert_eq!(
            table[&(ResourceType::Vm, RecycleType::Expired, ReturnedWay::ResourcePool)],
            TransitStrategy::Pool
        );
        assert_eq!(
            table[&(ResourceType::PhysicalMachine, RecycleType::Dissolve, ReturnedWay::ProviderReturn)],
            TransitStrategy::TwoHop
        );
        assert_eq!(
            table[&(ResourceType::PhysicalMachine, RecycleType::Regular, ReturnedWay::ProviderReturn)],
            TransitStrategy::Pool
        );
        assert_eq!(
            table[&(ResourceType::Other, RecycleType::Dissolve, ReturnedWay::ResourcePool)],
            TransitStrategy::Pool
        );
    }

    #[tokio::test]
    async fn test_pm_two_hop() {
        let f = fixture(
            MockInventoryClient::new().with_recycle_container(7, 700),
            MockAlarmShield::new(),
        );
        let order = OrderBuilder::new("PM-1")
            .with_biz(7)
            .with_resource_type(ResourceType::PhysicalMachine)
            .with_recycle_type(RecycleType::Dissolve)
            .with_status(RecycleStatus::Transiting)
            .build();
        let hosts = HostBuilder::many(&order, 2, ReturnedWay::ProviderReturn);
        TestEnv::seed(f.store.as_ref(), &order, &hosts).await.unwrap();

        let event = f.engine.run(&order).await.unwrap();
        assert_eq!(event.event_type, EventType::TransitSuccess);
        assert_eq!(
            f.inventory.moves(),
            vec![
                HostMove { host_ids: vec![1, 2], from: 7, to: 901 },
                HostMove { host_ids: vec![1, 2], from: 901, to: 700 },
            ]
        );

        let calls = f.shield.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].end - calls[0].start, chrono::Duration::hours(2));
    }

    #[tokio::test]
    async fn test_partial_failure_marks_hosts() {
        let f = fixture(
            MockInventoryClient::new()
                .with_recycle_container(3, 300)
                .failing_moves_to(300),
            MockAlarmShield::new(),
        );
        let order = OrderBuilder::new("VM-1")
            .with_biz(3)
            .with_status(RecycleStatus::Transiting)
            .build();
        let mut hosts = HostBuilder::many(&order, 4, ReturnedWay::ResourcePool);
        hosts[0].returned_way = ReturnedWay::ProviderReturn;
        TestEnv::seed(f.store.as_ref(), &order, &hosts).await.unwrap();

        let event = f.engine.run(&order).await.unwrap();
        assert_eq!(event.event_type, EventType::TransitFailed);
        assert!(event.message().contains("business_recycle"));

        let failed = f
            .store
            .list_hosts(&HostFilter::by_suborder("VM-1").with_status(RecycleStatus::TransitFailed))
            .await
            .unwrap();
        assert_eq!(failed.iter().map(|h| h.host_id).collect::<Vec<_>>(), vec![1]);

        // 成功分组仍然屏蔽告警
        assert_eq!(f.shield.calls().len(), 1);
        assert_eq!(f.shield.calls()[0].ips.len(), 3);
    }

    #[tokio::test]
    async fn test_shield_failure_ignored() {
        let f = fixture(MockInventoryClient::new(), MockAlarmShield::new().failing());
        let order = OrderBuilder::new("OT-1")
            .with_resource_type(ResourceType::Other)
            .with_status(RecycleStatus::Transiting)
            .build();
        let hosts = HostBuilder::many(&order, 1, ReturnedWay::ProviderReturn);
        TestEnv::seed(f.store.as_ref(), &order, &hosts).await.unwrap();

        let event = f.engine.run(&order).await.unwrap();
        assert_eq!(event.event_type, EventType::TransitSuccess);
        assert_eq!(f.inventory.moves()[0].to, 900);
    }

    #[tokio::test]
    async fn test_marking_error_still_reports_transit_failed() {
        let inner = Arc::new(MemoryRecycleStore::new());
        let inventory = MockInventoryClient::new()
            .with_recycle_container(3, 300)
            .failing_moves_to(300);
        let engine = TransitEngine::new(
            Arc::new(HostUpdatesFail(inner.clone())),
            Arc::new(inventory.clone()),
            Arc::new(MockAlarmShield::new()),
            config(),
            Arc::new(MetricsCollector::new()),
        );
        let order = OrderBuilder::new("VM-2")
            .with_biz(3)
            .with_status(RecycleStatus::Transiting)
            .build();
        let mut hosts = HostBuilder::many(&order, 4, ReturnedWay::ResourcePool);
        hosts[0].returned_way = ReturnedWay::ProviderReturn;
        TestEnv::seed(inner.as_ref(), &order, &hosts).await.unwrap();

        let event = engine.run(&order).await.unwrap();
        assert_eq!(event.event_type, EventType::TransitFailed);
        assert!(event.message().contains("host table locked"));

        // 业务待回收分组失败后，资源池分组照常搬迁
        assert_eq!(
            inventory.moves(),
            vec![
                HostMove { host_ids: vec![1], from: 3, to: 300 },
                HostMove { host_ids: vec![2, 3, 4], from: 3, to: 900 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_hop_waits_between_moves() {
        let f = fixture_with(
            MockInventoryClient::new().with_recycle_container(7, 700),
            MockAlarmShield::new(),
            TransitConfig {
                hop_interval_ms: 3_000,
                ..config()
            },
        );
        let order = OrderBuilder::new("PM-2")
            .with_biz(7)
            .with_resource_type(ResourceType::PhysicalMachine)
            .with_recycle_type(RecycleType::Expired)
            .with_status(RecycleStatus::Transiting)
            .build();
        let hosts = HostBuilder::many(&order, 1, ReturnedWay::ProviderReturn);
        TestEnv::seed(f.store.as_ref(), &order, &hosts).await.unwrap();

        let engine = Arc::new(f.engine);
        let handle = tokio::spawn({
            let engine = Arc::clone(&engine);
            let order = order.clone();
            async move { engine.run(&order).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            f.inventory.moves(),
            vec![HostMove { host_ids: vec![1], from: 7, to: 901 }]
        );

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(f.inventory.moves().len(), 2);
        assert_eq!(f.inventory.moves()[1], HostMove { host_ids: vec![1], from: 901, to: 700 });

        let event = handle.await.unwrap().unwrap();
        assert_eq!(event.event_type, EventType::TransitSuccess);
    }
}
