//! Test helper utilities

use recycler_domain::{RecycleHost, RecycleOrder, RecycleStore};
use recycler_errors::RecycleResult;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// 轮询条件直到满足或超时，使用 tokio 时钟以兼容暂停时间的测试
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition().await
    }

    /// 写入回收单及其主机
    pub async fn seed(
        store: &dyn RecycleStore,
        order: &RecycleOrder,
        hosts: &[RecycleHost],
    ) -> RecycleResult<()> {
        store.create_order(order).await?;
        store.create_hosts(hosts).await
    }
}
