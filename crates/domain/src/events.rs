//! 状态机事件
//!
//! 由状态处理器的 execute 阶段产生、advance 阶段消费，本身不持久化

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Commit,
    CommitSuccess,
    CommitFailed,
    DetectSuccess,
    DetectFailed,
    AuditApproved,
    AuditRejected,
    TransitSuccess,
    TransitFailed,
    ReturnSuccess,
    ReturnFailed,
    ReturnHandling,
    ReturnPlanSuccess,
    ReturnPlanFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Commit => "COMMIT",
            EventType::CommitSuccess => "COMMIT_SUCCESS",
            EventType::CommitFailed => "COMMIT_FAILED",
            EventType::DetectSuccess => "DETECT_SUCCESS",
            EventType::DetectFailed => "DETECT_FAILED",
            EventType::AuditApproved => "AUDIT_APPROVED",
            EventType::AuditRejected => "AUDIT_REJECTED",
            EventType::TransitSuccess => "TRANSIT_SUCCESS",
            EventType::TransitFailed => "TRANSIT_FAILED",
            EventType::ReturnSuccess => "RETURN_SUCCESS",
            EventType::ReturnFailed => "RETURN_FAILED",
            EventType::ReturnHandling => "RETURN_HANDLING",
            EventType::ReturnPlanSuccess => "RETURN_PLAN_SUCCESS",
            EventType::ReturnPlanFailed => "RETURN_PLAN_FAILED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    pub error: Option<String>,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            error: None,
        }
    }

    pub fn failed<S: ToString>(event_type: EventType, error: S) -> Self {
        Self {
            event_type,
            error: Some(error.to_string()),
        }
    }

    /// 写入回收单 message 字段的错误详情
    pub fn message(&self) -> String {
        self.error.clone().unwrap_or_default()
    }
}
