use async_trait::async_trait;
use recycler_domain::{
    DetectTask, HostFilter, HostUpdate, OrderFilter, OrderUpdate, RecycleHost, RecycleOrder,
    RecycleStore, Transition,
};
use recycler_errors::{RecycleError, RecycleResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    /// 回收单：子单号 -> 回收单
    orders: HashMap<String, RecycleOrder>,
    /// 主机按写入顺序保存，便于列表结果稳定
    hosts: Vec<RecycleHost>,
    detect_tasks: Vec<DetectTask>,
}

/// 内存回收单存储
///
/// 单把读写锁保护全部数据，`apply_transition` 在同一把写锁内完成条件判断、
/// 回收单更新与主机更新，因此对并发调用者是原子的。适用于嵌入式部署与测试。
#[derive(Debug, Clone, Default)]
pub struct MemoryRecycleStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryRecycleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn update_orders(state: &mut StoreState, filter: &OrderFilter, update: &OrderUpdate) -> u64 {
    let mut affected = 0;
    for order in state.orders.values_mut().filter(|o| filter.matches(o)) {
        update.apply(order);
        affected += 1;
    }
    affected
}

fn update_hosts(state: &mut StoreState, filter: &HostFilter, update: &HostUpdate) -> u64 {
    let mut affected = 0;
    for host in state.hosts.iter_mut().filter(|h| filter.matches(h)) {
        update.apply(host);
        affected += 1;
    }
    affected
}

fn check_new_order(state: &StoreState, order: &RecycleOrder) -> RecycleResult<()> {
    if state.orders.contains_key(&order.suborder_id) {
        return Err(RecycleError::validation_error(format!(
            "回收单已存在: {}",
            order.suborder_id
        )));
    }
    Ok(())
}

fn check_new_hosts(state: &StoreState, hosts: &[RecycleHost]) -> RecycleResult<()> {
    for host in hosts {
        if state
            .hosts
            .iter()
            .any(|h| h.suborder_id == host.suborder_id && h.host_id == host.host_id)
        {
            return Err(RecycleError::validation_error(format!(
                "主机 {} 已在回收单 {} 中",
                host.host_id, host.suborder_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl RecycleStore for MemoryRecycleStore {
    async fn create_order(&self, order: &RecycleOrder) -> RecycleResult<()> {
        let mut state = self.state.write().await;
        check_new_order(&state, order)?;
        state
            .orders
            .insert(order.suborder_id.clone(), order.clone());
        debug!("内存存储创建回收单: {}", order.suborder_id);
        Ok(())
    }

    async fn get_order(&self, suborder_id: &str) -> RecycleResult<Option<RecycleOrder>> {
        let state = self.state.read().await;
        Ok(state.orders.get(suborder_id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> RecycleResult<Vec<RecycleOrder>> {
        let state = self.state.read().await;
        let mut orders: Vec<RecycleOrder> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.suborder_id.cmp(&b.suborder_id)));
        if let Some(limit) = filter.limit {
            orders.truncate(limit.max(0) as usize);
        }
        Ok(orders)
    }

    async fn update_order(&self, filter: &OrderFilter, update: &OrderUpdate) -> RecycleResult<u64> {
        let mut state = self.state.write().await;
        Ok(update_orders(&mut state, filter, update))
    }

    async fn create_hosts(&self, hosts: &[RecycleHost]) -> RecycleResult<()> {
        let mut state = self.state.write().await;
        check_new_hosts(&state, hosts)?;
        state.hosts.extend(hosts.iter().cloned());
        Ok(())
    }

    async fn create_order_with_hosts(
        &self,
        order: &RecycleOrder,
        hosts: &[RecycleHost],
    ) -> RecycleResult<()> {
        let mut state = self.state.write().await;
        check_new_order(&state, order)?;
        check_new_hosts(&state, hosts)?;
        state
            .orders
            .insert(order.suborder_id.clone(), order.clone());
        state.hosts.extend(hosts.iter().cloned());
        debug!("内存存储创建回收单: {}，主机 {} 台", order.suborder_id, hosts.len());
        Ok(())
    }

    async fn list_hosts(&self, filter: &HostFilter) -> RecycleResult<Vec<RecycleHost>> {
        let state = self.state.read().await;
        Ok(state
            .hosts
            .iter()
            .filter(|h| filter.matches(h))
            .cloned()
            .collect())
    }

    async fn update_hosts(&self, filter: &HostFilter, update: &HostUpdate) -> RecycleResult<u64> {
        let mut state = self.state.write().await;
        Ok(update_hosts(&mut state, filter, update))
    }

    async fn create_detect_tasks(&self, tasks: &[DetectTask]) -> RecycleResult<()> {
        let mut state = self.state.write().await;
        state.detect_tasks.extend(tasks.iter().cloned());
        Ok(())
    }

    async fn list_detect_tasks(&self, suborder_id: &str) -> RecycleResult<Vec<DetectTask>> {
        let state = self.state.read().await;
        Ok(state
            .detect_tasks
            .iter()
            .filter(|t| t.suborder_id == suborder_id)
            .cloned()
            .collect())
    }

    async fn apply_transition(&self, transition: &Transition) -> RecycleResult<bool> {
        let mut state = self.state.write().await;
        let affected = update_orders(&mut state, &transition.order_filter, &transition.order_update);
        if affected == 0 {
            return Ok(false);
        }
        if let Some((filter, update)) = &transition.hosts {
            update_hosts(&mut state, filter, update);
        }
        Ok(true)
    }
}
