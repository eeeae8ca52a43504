use recycler_errors::{RecycleError, RecycleResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// 外部系统统一的响应包装
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// 基于 reqwest 的 JSON 调用，所有操作均为 `POST {base_url}/{operation}`
#[derive(Debug, Clone)]
pub struct CollaboratorHttpClient {
    system: &'static str,
    base_url: String,
    http_client: reqwest::Client,
}

impl CollaboratorHttpClient {
    pub fn new(system: &'static str, base_url: &str, timeout: Duration) -> RecycleResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            system,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn system(&self) -> &'static str {
        self.system
    }

    /// 调用并解析 `data`，`code != 0` 视为业务失败
    pub async fn call<B, T>(&self, operation: &str, body: &B) -> RecycleResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, operation);
        debug!(system = self.system, url = %url, "calling collaborator");

        let response = self.http_client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(system = self.system, operation, "HTTP {} - {}", status, text);
            return Err(RecycleError::collaborator(
                self.system,
                format!("{operation}: HTTP {status} - {text}"),
            ));
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(RecycleError::collaborator(
                self.system,
                format!("{operation}: code {} - {}", envelope.code, envelope.message),
            ));
        }
        Ok(envelope.data)
    }

    /// 只关心成功与否的调用
    pub async fn call_unit<B>(&self, operation: &str, body: &B) -> RecycleResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.call::<B, serde_json::Value>(operation, body).await?;
        Ok(())
    }
}
