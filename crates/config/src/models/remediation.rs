use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;

/// 各失败状态对应的人工处理人
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemediationConfig {
    pub detect_failed: String,
    pub transit_failed: String,
    pub return_failed: String,
    pub return_plan_failed: String,
    pub terminate: String,
    pub rejected: String,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            detect_failed: "detect-ops".to_string(),
            transit_failed: "cmdb-ops".to_string(),
            return_failed: "return-ops".to_string(),
            return_plan_failed: "plan-ops".to_string(),
            terminate: "recycle-ops".to_string(),
            rejected: "recycle-ops".to_string(),
        }
    }
}

impl ConfigValidator for RemediationConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.detect_failed, "remediation.detect_failed")?;
        ValidationUtils::validate_not_empty(&self.transit_failed, "remediation.transit_failed")?;
        ValidationUtils::validate_not_empty(&self.return_failed, "remediation.return_failed")?;
        ValidationUtils::validate_not_empty(
            &self.return_plan_failed,
            "remediation.return_plan_failed",
        )?;
        ValidationUtils::validate_not_empty(&self.terminate, "remediation.terminate")?;
        ValidationUtils::validate_not_empty(&self.rejected, "remediation.rejected")?;
        Ok(())
    }
}
