use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecycleError {
    #[error("回收单不存在: {suborder_id}")]
    OrderNotFound { suborder_id: String },
    #[error("状态 {status} 收到未知事件: {event}")]
    UnknownEvent { status: String, event: String },
    #[error("任务上下文无效: {0}")]
    InvalidContext(String),
    #[error("回收单 {suborder_id} 状态已变更，期望 {expected}")]
    StaleStatus {
        suborder_id: String,
        expected: String,
    },
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("外部系统调用失败: {system} - {message}")]
    Collaborator { system: String, message: String },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type RecycleResult<T> = Result<T, RecycleError>;

impl RecycleError {
    pub fn order_not_found<S: Into<String>>(suborder_id: S) -> Self {
        Self::OrderNotFound {
            suborder_id: suborder_id.into(),
        }
    }
    pub fn unknown_event<S: ToString, E: ToString>(status: S, event: E) -> Self {
        Self::UnknownEvent {
            status: status.to_string(),
            event: event.to_string(),
        }
    }
    pub fn invalid_context<S: Into<String>>(msg: S) -> Self {
        Self::InvalidContext(msg.into())
    }
    pub fn stale_status<S: Into<String>, E: ToString>(suborder_id: S, expected: E) -> Self {
        Self::StaleStatus {
            suborder_id: suborder_id.into(),
            expected: expected.to_string(),
        }
    }
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn collaborator<S: Into<String>, M: Into<String>>(system: S, message: M) -> Self {
        Self::Collaborator {
            system: system.into(),
            message: message.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RecycleError::Internal(_) | RecycleError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecycleError::DatabaseOperation(_)
                | RecycleError::Collaborator { .. }
                | RecycleError::Network(_)
                | RecycleError::Timeout(_)
                | RecycleError::StaleStatus { .. }
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            RecycleError::OrderNotFound { .. } => "请求的回收单不存在",
            RecycleError::StaleStatus { .. } => "回收单状态已变化，请刷新后重试",
            RecycleError::InvalidContext(_) => "回收单数据不完整",
            RecycleError::ValidationError(_) => "输入数据验证失败",
            RecycleError::Timeout(_) => "操作超时，请稍后重试",
            RecycleError::Collaborator { .. } => "外部系统暂不可用，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<sqlx::Error> for RecycleError {
    fn from(err: sqlx::Error) -> Self {
        RecycleError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for RecycleError {
    fn from(err: serde_json::Error) -> Self {
        RecycleError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RecycleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RecycleError::Timeout(err.to_string())
        } else {
            RecycleError::Network(err.to_string())
        }
    }
}

impl From<anyhow::Error> for RecycleError {
    fn from(err: anyhow::Error) -> Self {
        RecycleError::Internal(err.to_string())
    }
}
