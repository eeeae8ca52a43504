use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;

/// 主机搬迁的目标容器与节奏
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitConfig {
    /// 资源池待清理模块
    pub pool_container_id: i64,
    /// 两段搬迁的系统中转模块
    pub system_transit_container_id: i64,
    /// 两段搬迁之间的等待，等库存系统完成第一段
    pub hop_interval_ms: u64,
    /// 搬迁成功后屏蔽告警的时长
    pub alarm_shield_window_hours: i64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            pool_container_id: 5_000_001,
            system_transit_container_id: 5_000_002,
            hop_interval_ms: 3_000,
            alarm_shield_window_hours: 72,
        }
    }
}

impl ConfigValidator for TransitConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_positive_id(self.pool_container_id, "transit.pool_container_id")?;
        ValidationUtils::validate_positive_id(
            self.system_transit_container_id,
            "transit.system_transit_container_id",
        )?;
        ValidationUtils::validate_count(
            self.alarm_shield_window_hours.max(0) as usize,
            "transit.alarm_shield_window_hours",
            24 * 30,
        )?;
        Ok(())
    }
}
