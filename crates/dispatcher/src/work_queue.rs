//! 按 key 去重、限速的工作队列
//!
//! 同一个 key 在队列中最多出现一次；处理中的 key 再次加入时只做标记，
//! 在本轮处理结束（`done`）后重新入队，因此同一回收单不会被两个 worker 同时处理。

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    /// 等待处理的 key，包括处理中被再次加入的
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl WorkQueue {
    /// `qps` 为 0 时不限速
    pub fn new(qps: u32, burst: u32) -> Self {
        let limiter = NonZeroU32::new(qps).map(|rate| {
            let burst = NonZeroU32::new(burst.max(qps)).unwrap_or(rate);
            RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))
        });
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            limiter,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    pub async fn add(&self, key: &str) {
        let mut state = self.state.lock().await;
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        if state.processing.contains(key) {
            debug!(suborder_id = key, "处理中的回收单再次入队，等待本轮结束");
            return;
        }
        state.queue.push_back(key.to_string());
        drop(state);
        self.notify.notify_one();
    }

    /// 延迟入队，不占用 worker
    pub fn add_after(self: &Arc<Self>, key: &str, delay: Duration) {
        let queue = Arc::clone(self);
        let key = key.to_string();
        let deadline = tokio::time::Instant::now() + delay;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            queue.add(&key).await;
        });
    }

    /// 等待下一个 key；队列关闭后立即返回 None，剩余的 key 留在队列中
    pub async fn pop(&self) -> Option<String> {
        let key = loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    if !state.queue.is_empty() {
                        self.notify.notify_one();
                    }
                    break key;
                }
            }

            notified.await;
        };

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        Some(key)
    }

    /// 结束一轮处理；处理期间被再次加入的 key 重新入队
    pub async fn done(&self, key: &str) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// 停止发放新的 key，已在处理中的不受影响
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.shutting_down = true;
        drop(state);
        self.notify.notify_waiters();
        info!("工作队列已关闭");
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.state.lock().await.shutting_down
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn processing_len(&self) -> usize {
        self.state.lock().await.processing.len()
    }

    pub async fn is_queued(&self, key: &str) -> bool {
        self.state.lock().await.dirty.contains(key)
    }

    pub async fn is_processing(&self, key: &str) -> bool {
        self.state.lock().await.processing.contains(key)
    }
}
