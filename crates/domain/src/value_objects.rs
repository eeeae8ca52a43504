use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 自动流转时写入的处理人
pub const AUTO_HANDLER: &str = "AUTO";

/// 物理机常规回收超过该台数需要人工审核
pub const BULK_AUDIT_THRESHOLD: i32 = 10;

/// 存储层中的库存容器（业务、模块或资源池）ID
pub type ContainerId = i64;

/// 为持久化的字符串枚举生成 `as_str`、`Display` 与 `FromStr`
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$($name::$variant,)+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {s}", stringify!($name))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceType {
    #[serde(rename = "VM")]
    Vm,
    #[serde(rename = "PM")]
    PhysicalMachine,
    #[serde(rename = "OTHER")]
    Other,
}

string_enum!(ResourceType {
    Vm => "VM",
    PhysicalMachine => "PM",
    Other => "OTHER",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecycleType {
    #[serde(rename = "DISSOLVE")]
    Dissolve,
    #[serde(rename = "EXPIRED")]
    Expired,
    #[serde(rename = "REGULAR")]
    Regular,
}

string_enum!(RecycleType {
    Dissolve => "DISSOLVE",
    Expired => "EXPIRED",
    Regular => "REGULAR",
});

/// 主机退还方式，决定 Transit 走哪条搬迁路径
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ReturnedWay {
    #[default]
    #[serde(rename = "PROVIDER")]
    ProviderReturn,
    #[serde(rename = "RESOURCE_POOL")]
    ResourcePool,
}

string_enum!(ReturnedWay {
    ProviderReturn => "PROVIDER",
    ResourcePool => "RESOURCE_POOL",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecycleStage {
    #[serde(rename = "COMMIT")]
    Commit,
    #[serde(rename = "DETECT")]
    Detect,
    #[serde(rename = "AUDIT")]
    Audit,
    #[serde(rename = "TRANSIT")]
    Transit,
    #[serde(rename = "RETURN")]
    Return,
    #[serde(rename = "RETURN_PLAN")]
    ReturnPlan,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "TERMINATE")]
    Terminate,
}

string_enum!(RecycleStage {
    Commit => "COMMIT",
    Detect => "DETECT",
    Audit => "AUDIT",
    Transit => "TRANSIT",
    Return => "RETURN",
    ReturnPlan => "RETURN_PLAN",
    Done => "DONE",
    Terminate => "TERMINATE",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecycleStatus {
    #[serde(rename = "UNCOMMIT")]
    Uncommit,
    #[serde(rename = "COMMITTED")]
    Committed,
    #[serde(rename = "DETECTING")]
    Detecting,
    #[serde(rename = "DETECT_FAILED")]
    DetectFailed,
    #[serde(rename = "AUDIT")]
    Audit,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "TRANSITING")]
    Transiting,
    #[serde(rename = "TRANSIT_FAILED")]
    TransitFailed,
    #[serde(rename = "RETURNING")]
    Returning,
    #[serde(rename = "RETURN_FAILED")]
    ReturnFailed,
    #[serde(rename = "RETURNING_PLAN")]
    ReturningPlan,
    #[serde(rename = "RETURN_PLAN_FAILED")]
    ReturnPlanFailed,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "TERMINATE")]
    Terminate,
}

string_enum!(RecycleStatus {
    Uncommit => "UNCOMMIT",
    Committed => "COMMITTED",
    Detecting => "DETECTING",
    DetectFailed => "DETECT_FAILED",
    Audit => "AUDIT",
    Rejected => "REJECTED",
    Transiting => "TRANSITING",
    TransitFailed => "TRANSIT_FAILED",
    Returning => "RETURNING",
    ReturnFailed => "RETURN_FAILED",
    ReturningPlan => "RETURNING_PLAN",
    ReturnPlanFailed => "RETURN_PLAN_FAILED",
    Done => "DONE",
    Terminate => "TERMINATE",
});

impl RecycleStatus {
    /// 状态所属的粗粒度阶段
    pub fn stage(&self) -> RecycleStage {
        use RecycleStatus::*;
        match self {
            Uncommit | Committed => RecycleStage::Commit,
            Detecting | DetectFailed => RecycleStage::Detect,
            Audit | Rejected => RecycleStage::Audit,
            Transiting | TransitFailed => RecycleStage::Transit,
            Returning | ReturnFailed => RecycleStage::Return,
            ReturningPlan | ReturnPlanFailed => RecycleStage::ReturnPlan,
            Done => RecycleStage::Done,
            Terminate => RecycleStage::Terminate,
        }
    }

    /// 终态：需要人工介入的失败态以及完成、终止、驳回
    pub fn is_terminal(&self) -> bool {
        use RecycleStatus::*;
        matches!(
            self,
            DetectFailed
                | Rejected
                | TransitFailed
                | ReturnFailed
                | ReturnPlanFailed
                | Done
                | Terminate
        )
    }

    pub fn is_failed(&self) -> bool {
        use RecycleStatus::*;
        matches!(
            self,
            DetectFailed | TransitFailed | ReturnFailed | ReturnPlanFailed
        )
    }

    /// 进程重启后需要重新入队继续推进的状态
    pub fn is_resumable(&self) -> bool {
        use RecycleStatus::*;
        matches!(
            self,
            Committed | Detecting | Transiting | Returning | ReturningPlan
        )
    }
}

/// 短租系统中关联记录的退还状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShortRentalStatus {
    #[serde(rename = "RETURNED")]
    Returned,
    #[serde(rename = "TERMINATE")]
    Terminate,
}

string_enum!(ShortRentalStatus {
    Returned => "RETURNED",
    Terminate => "TERMINATE",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DetectTaskStatus {
    #[default]
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

string_enum!(DetectTaskStatus {
    Init => "INIT",
    Running => "RUNNING",
    Success => "SUCCESS",
    Failed => "FAILED",
});

/// 人工审核结论
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditDecision {
    pub approval: bool,
    pub remark: String,
}
