//! 外部协作系统的 HTTP 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recycler_config::CollaboratorsConfig;
use recycler_domain::{
    AlarmShieldClient, ContainerId, Detector, Event, EventType, InventoryClient, RecycleOrder,
    Returner, ShortRentalNotifier, ShortRentalStatus,
};
use recycler_errors::{RecycleError, RecycleResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::http::CollaboratorHttpClient;

pub struct HttpDetector {
    client: CollaboratorHttpClient,
}

impl HttpDetector {
    pub fn new(client: CollaboratorHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionStatus {
    status: String,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl Detector for HttpDetector {
    async fn run_detection(&self, suborder_id: &str) -> RecycleResult<()> {
        self.client
            .call_unit("run_detection", &json!({ "suborder_id": suborder_id }))
            .await
    }

    async fn check_detection_status(&self, suborder_id: &str) -> RecycleResult<()> {
        let status: Option<DetectionStatus> = self
            .client
            .call("check_detection_status", &json!({ "suborder_id": suborder_id }))
            .await?;
        match status {
            Some(s) if s.status == "SUCCESS" => Ok(()),
            Some(s) => Err(RecycleError::collaborator(
                self.client.system(),
                format!("检测未通过: {} {}", s.status, s.message),
            )),
            None => Err(RecycleError::collaborator(
                self.client.system(),
                "检测状态为空",
            )),
        }
    }
}

pub struct HttpReturner {
    client: CollaboratorHttpClient,
}

impl HttpReturner {
    pub fn new(client: CollaboratorHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ReturnStatus {
    status: String,
    #[serde(default)]
    message: String,
}

fn order_payload(order: &RecycleOrder) -> serde_json::Value {
    json!({
        "order_id": order.order_id,
        "suborder_id": order.suborder_id,
        "bk_biz_id": order.bk_biz_id,
        "resource_type": order.resource_type,
        "recycle_type": order.recycle_type,
        "total_num": order.total_num,
    })
}

#[async_trait]
impl Returner for HttpReturner {
    async fn initiate_return(&self, order: &RecycleOrder) -> Event {
        let result: RecycleResult<Option<ReturnStatus>> = self
            .client
            .call("initiate_return", &order_payload(order))
            .await;
        match result {
            Ok(Some(s)) => match s.status.as_str() {
                "SUCCESS" => Event::new(EventType::ReturnSuccess),
                "HANDLING" => Event::new(EventType::ReturnHandling),
                _ => Event::failed(EventType::ReturnFailed, s.message),
            },
            Ok(None) => Event::failed(EventType::ReturnFailed, "退还状态为空"),
            Err(e) => {
                warn!("退还接口调用失败: {} - {}", order.suborder_id, e);
                Event::failed(EventType::ReturnFailed, e)
            }
        }
    }

    async fn adjust_forecast(&self, order: &RecycleOrder) -> Event {
        match self
            .client
            .call_unit("adjust_forecast", &order_payload(order))
            .await
        {
            Ok(()) => Event::new(EventType::ReturnPlanSuccess),
            Err(e) => Event::failed(EventType::ReturnPlanFailed, e),
        }
    }
}

pub struct HttpInventoryClient {
    client: CollaboratorHttpClient,
}

impl HttpInventoryClient {
    pub fn new(client: CollaboratorHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct RecycleContainer {
    container_id: ContainerId,
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn move_hosts(
        &self,
        host_ids: &[i64],
        from: ContainerId,
        to: ContainerId,
    ) -> RecycleResult<()> {
        self.client
            .call_unit(
                "move_hosts",
                &json!({ "host_ids": host_ids, "from": from, "to": to }),
            )
            .await
    }

    async fn lookup_recycle_container(&self, bk_biz_id: i64) -> RecycleResult<ContainerId> {
        let container: Option<RecycleContainer> = self
            .client
            .call("lookup_recycle_container", &json!({ "bk_biz_id": bk_biz_id }))
            .await?;
        container.map(|c| c.container_id).ok_or_else(|| {
            RecycleError::collaborator(
                self.client.system(),
                format!("业务 {bk_biz_id} 没有待回收模块"),
            )
        })
    }
}

pub struct HttpAlarmShieldClient {
    client: CollaboratorHttpClient,
}

impl HttpAlarmShieldClient {
    pub fn new(client: CollaboratorHttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlarmShieldClient for HttpAlarmShieldClient {
    async fn suppress(
        &self,
        ips: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RecycleResult<()> {
        self.client
            .call_unit(
                "suppress",
                &json!({ "ips": ips, "start": start.to_rfc3339(), "end": end.to_rfc3339() }),
            )
            .await
    }
}

pub struct HttpShortRentalNotifier {
    client: CollaboratorHttpClient,
}

impl HttpShortRentalNotifier {
    pub fn new(client: CollaboratorHttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ShortRentalNotifier for HttpShortRentalNotifier {
    async fn set_returned_status(
        &self,
        suborder_id: &str,
        status: ShortRentalStatus,
    ) -> RecycleResult<()> {
        self.client
            .call_unit(
                "set_returned_status",
                &json!({ "suborder_id": suborder_id, "status": status }),
            )
            .await
    }
}

/// 全部外部系统客户端
#[derive(Clone)]
pub struct CollaboratorClients {
    pub detector: Arc<dyn Detector>,
    pub returner: Arc<dyn Returner>,
    pub inventory: Arc<dyn InventoryClient>,
    pub alarm_shield: Arc<dyn AlarmShieldClient>,
    pub short_rental: Arc<dyn ShortRentalNotifier>,
}

impl CollaboratorClients {
    pub fn from_config(config: &CollaboratorsConfig) -> RecycleResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        Ok(Self {
            detector: Arc::new(HttpDetector::new(CollaboratorHttpClient::new(
                "detector",
                &config.detector_url,
                timeout,
            )?)),
            returner: Arc::new(HttpReturner::new(CollaboratorHttpClient::new(
                "returner",
                &config.returner_url,
                timeout,
            )?)),
            inventory: Arc::new(HttpInventoryClient::new(CollaboratorHttpClient::new(
                "inventory",
                &config.inventory_url,
                timeout,
            )?)),
            alarm_shield: Arc::new(HttpAlarmShieldClient::new(CollaboratorHttpClient::new(
                "alarm_shield",
                &config.alarm_shield_url,
                timeout,
            )?)),
            short_rental: Arc::new(HttpShortRentalNotifier::new(CollaboratorHttpClient::new(
                "short_rental",
                &config.short_rental_url,
                timeout,
            )?)),
        })
    }
}
