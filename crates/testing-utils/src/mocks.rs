//! Mock implementations for the collaborator traits
//!
//! 每个替身记录调用参数，并可配置为失败，用于驱动状态机的各条分支。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recycler_domain::{
    AlarmShieldClient, ContainerId, Detector, Event, EventType, InventoryClient, RecycleOrder,
    Returner, ShortRentalNotifier, ShortRentalStatus,
};
use recycler_errors::{RecycleError, RecycleResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock implementation of Detector
#[derive(Debug, Clone, Default)]
pub struct MockDetector {
    run_error: Arc<Mutex<Option<String>>>,
    check_error: Arc<Mutex<Option<String>>>,
    runs: Arc<Mutex<Vec<String>>>,
    checks: Arc<Mutex<Vec<String>>>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_run(self, error: &str) -> Self {
        *self.run_error.lock().unwrap() = Some(error.to_string());
        self
    }

    pub fn failing_check(self, error: &str) -> Self {
        *self.check_error.lock().unwrap() = Some(error.to_string());
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn run_detection(&self, suborder_id: &str) -> RecycleResult<()> {
        self.runs.lock().unwrap().push(suborder_id.to_string());
        match self.run_error.lock().unwrap().clone() {
            Some(error) => Err(RecycleError::collaborator("detector", error)),
            None => Ok(()),
        }
    }

    async fn check_detection_status(&self, suborder_id: &str) -> RecycleResult<()> {
        self.checks.lock().unwrap().push(suborder_id.to_string());
        match self.check_error.lock().unwrap().clone() {
            Some(error) => Err(RecycleError::collaborator("detector", error)),
            None => Ok(()),
        }
    }
}

/// Mock implementation of Returner
///
/// `initiate_return` 依次返回预设事件，最后一个事件重复使用。
#[derive(Debug, Clone)]
pub struct MockReturner {
    return_events: Arc<Mutex<VecDeque<Event>>>,
    forecast_event: Arc<Mutex<Event>>,
    return_calls: Arc<Mutex<Vec<String>>>,
    forecast_calls: Arc<Mutex<Vec<String>>>,
}

impl MockReturner {
    pub fn new() -> Self {
        Self {
            return_events: Arc::new(Mutex::new(VecDeque::from([Event::new(
                EventType::ReturnSuccess,
            )]))),
            forecast_event: Arc::new(Mutex::new(Event::new(EventType::ReturnPlanSuccess))),
            return_calls: Arc::new(Mutex::new(Vec::new())),
            forecast_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_return_events(self, events: Vec<Event>) -> Self {
        *self.return_events.lock().unwrap() = events.into();
        self
    }

    pub fn with_forecast_event(self, event: Event) -> Self {
        *self.forecast_event.lock().unwrap() = event;
        self
    }

    pub fn return_count(&self) -> usize {
        self.return_calls.lock().unwrap().len()
    }

    pub fn forecast_count(&self) -> usize {
        self.forecast_calls.lock().unwrap().len()
    }
}

impl Default for MockReturner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Returner for MockReturner {
    async fn initiate_return(&self, order: &RecycleOrder) -> Event {
        self.return_calls
            .lock()
            .unwrap()
            .push(order.suborder_id.clone());
        let mut events = self.return_events.lock().unwrap();
        if events.len() > 1 {
            events.pop_front().unwrap()
        } else {
            events
                .front()
                .cloned()
                .unwrap_or_else(|| Event::new(EventType::ReturnSuccess))
        }
    }

    async fn adjust_forecast(&self, order: &RecycleOrder) -> Event {
        self.forecast_calls
            .lock()
            .unwrap()
            .push(order.suborder_id.clone());
        self.forecast_event.lock().unwrap().clone()
    }
}

/// 一次主机搬迁调用
#[derive(Debug, Clone, PartialEq)]
pub struct HostMove {
    pub host_ids: Vec<i64>,
    pub from: ContainerId,
    pub to: ContainerId,
}

/// Mock implementation of InventoryClient
///
/// 业务的待回收模块默认为 `bk_biz_id * 100`。
#[derive(Debug, Clone, Default)]
pub struct MockInventoryClient {
    recycle_containers: Arc<Mutex<HashMap<i64, ContainerId>>>,
    failing_targets: Arc<Mutex<HashSet<ContainerId>>>,
    lookup_error: Arc<Mutex<Option<String>>>,
    moves: Arc<Mutex<Vec<HostMove>>>,
}

impl MockInventoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recycle_container(self, bk_biz_id: i64, container: ContainerId) -> Self {
        self.recycle_containers
            .lock()
            .unwrap()
            .insert(bk_biz_id, container);
        self
    }

    /// 搬往该容器的调用全部失败
    pub fn failing_moves_to(self, container: ContainerId) -> Self {
        self.failing_targets.lock().unwrap().insert(container);
        self
    }

    pub fn failing_lookup(self, error: &str) -> Self {
        *self.lookup_error.lock().unwrap() = Some(error.to_string());
        self
    }

    pub fn moves(&self) -> Vec<HostMove> {
        self.moves.lock().unwrap().clone()
    }

    pub fn recycle_container_of(&self, bk_biz_id: i64) -> ContainerId {
        self.recycle_containers
            .lock()
            .unwrap()
            .get(&bk_biz_id)
            .copied()
            .unwrap_or(bk_biz_id * 100)
    }
}

#[async_trait]
impl InventoryClient for MockInventoryClient {
    async fn move_hosts(
        &self,
        host_ids: &[i64],
        from: ContainerId,
        to: ContainerId,
    ) -> RecycleResult<()> {
        self.moves.lock().unwrap().push(HostMove {
            host_ids: host_ids.to_vec(),
            from,
            to,
        });
        if self.failing_targets.lock().unwrap().contains(&to) {
            return Err(RecycleError::collaborator(
                "inventory",
                format!("move to {to} rejected"),
            ));
        }
        Ok(())
    }

    async fn lookup_recycle_container(&self, bk_biz_id: i64) -> RecycleResult<ContainerId> {
        if let Some(error) = self.lookup_error.lock().unwrap().clone() {
            return Err(RecycleError::collaborator("inventory", error));
        }
        Ok(self.recycle_container_of(bk_biz_id))
    }
}

/// 一次告警屏蔽调用
#[derive(Debug, Clone, PartialEq)]
pub struct ShieldCall {
    pub ips: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Mock implementation of AlarmShieldClient
#[derive(Debug, Clone, Default)]
pub struct MockAlarmShield {
    failing: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<ShieldCall>>>,
}

impl MockAlarmShield {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        *self.failing.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<ShieldCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlarmShieldClient for MockAlarmShield {
    async fn suppress(
        &self,
        ips: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RecycleResult<()> {
        self.calls.lock().unwrap().push(ShieldCall {
            ips: ips.to_vec(),
            start,
            end,
        });
        if *self.failing.lock().unwrap() {
            return Err(RecycleError::collaborator("alarm_shield", "shield unavailable"));
        }
        Ok(())
    }
}

/// Mock implementation of ShortRentalNotifier
#[derive(Debug, Clone, Default)]
pub struct MockShortRentalNotifier {
    failing: Arc<Mutex<bool>>,
    notifications: Arc<Mutex<Vec<(String, ShortRentalStatus)>>>,
}

impl MockShortRentalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        *self.failing.lock().unwrap() = true;
        self
    }

    pub fn notifications(&self) -> Vec<(String, ShortRentalStatus)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShortRentalNotifier for MockShortRentalNotifier {
    async fn set_returned_status(
        &self,
        suborder_id: &str,
        status: ShortRentalStatus,
    ) -> RecycleResult<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((suborder_id.to_string(), status));
        if *self.failing.lock().unwrap() {
            return Err(RecycleError::collaborator("short_rental", "notify failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recycler_domain::{RecycleType, ResourceType};

    #[tokio::test]
    async fn test_mock_returner_sequence() {
        let order = RecycleOrder::new(1, "S".to_string(), 1, ResourceType::Vm, RecycleType::Expired);
        let returner = MockReturner::new().with_return_events(vec![
            Event::new(EventType::ReturnHandling),
            Event::new(EventType::ReturnSuccess),
        ]);
        assert_eq!(
            returner.initiate_return(&order).await.event_type,
            EventType::ReturnHandling
        );
        assert_eq!(
            returner.initiate_return(&order).await.event_type,
            EventType::ReturnSuccess
        );
        assert_eq!(
            returner.initiate_return(&order).await.event_type,
            EventType::ReturnSuccess
        );
        assert_eq!(returner.return_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_inventory_failures() {
        let inventory = MockInventoryClient::new()
            .with_recycle_container(7, 77)
            .failing_moves_to(77);
        assert_eq!(inventory.lookup_recycle_container(7).await.unwrap(), 77);
        assert_eq!(inventory.lookup_recycle_container(8).await.unwrap(), 800);
        assert!(inventory.move_hosts(&[1], 7, 77).await.is_err());
        assert!(inventory.move_hosts(&[1], 7, 78).await.is_ok());
        assert_eq!(inventory.moves().len(), 2);
    }
}
