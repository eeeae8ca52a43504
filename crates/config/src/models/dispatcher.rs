use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    pub enabled: bool,
    /// 并发处理回收单的 worker 数
    pub worker_count: usize,
    /// 出队令牌桶速率，0 表示不限速
    pub queue_qps: u32,
    pub queue_burst: u32,
    /// 退还处理中时的重新检查间隔
    pub returning_poll_interval_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    /// 启动时将处于可恢复状态的回收单重新入队
    pub resume_on_start: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_count: 8,
            queue_qps: 50,
            queue_burst: 100,
            returning_poll_interval_seconds: 300,
            shutdown_timeout_seconds: 30,
            resume_on_start: true,
        }
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_count(self.worker_count, "dispatcher.worker_count", 1000)?;
        if self.queue_qps > 100_000 {
            return Err(ConfigError::Validation(
                "dispatcher.queue_qps must be less than or equal to 100000".to_string(),
            ));
        }
        if self.queue_qps > 0 && self.queue_burst < self.queue_qps {
            return Err(ConfigError::Validation(
                "dispatcher.queue_burst cannot be less than queue_qps".to_string(),
            ));
        }

        ValidationUtils::validate_timeout(
            self.returning_poll_interval_seconds,
            "dispatcher.returning_poll_interval_seconds",
        )?;
        ValidationUtils::validate_timeout(
            self.shutdown_timeout_seconds,
            "dispatcher.shutdown_timeout_seconds",
        )?;

        Ok(())
    }
}
