use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;

/// 外部系统地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub inventory_url: String,
    pub detector_url: String,
    pub returner_url: String,
    pub alarm_shield_url: String,
    pub short_rental_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            inventory_url: "http://127.0.0.1:9100/inventory".to_string(),
            detector_url: "http://127.0.0.1:9100/detector".to_string(),
            returner_url: "http://127.0.0.1:9100/returner".to_string(),
            alarm_shield_url: "http://127.0.0.1:9100/alarm".to_string(),
            short_rental_url: "http://127.0.0.1:9100/short-rental".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for CollaboratorsConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_url(&self.inventory_url, "collaborators.inventory_url")?;
        ValidationUtils::validate_url(&self.detector_url, "collaborators.detector_url")?;
        ValidationUtils::validate_url(&self.returner_url, "collaborators.returner_url")?;
        ValidationUtils::validate_url(&self.alarm_shield_url, "collaborators.alarm_shield_url")?;
        ValidationUtils::validate_url(&self.short_rental_url, "collaborators.short_rental_url")?;
        ValidationUtils::validate_timeout(
            self.request_timeout_seconds,
            "collaborators.request_timeout_seconds",
        )?;
        Ok(())
    }
}
