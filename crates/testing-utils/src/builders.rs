//! Test data builders for creating test entities

use recycler_domain::{
    RecycleHost, RecycleOrder, RecycleStatus, RecycleType, ResourceType, ReturnedWay,
};

/// Builder for creating test RecycleOrder entities
pub struct OrderBuilder {
    order: RecycleOrder,
}

impl OrderBuilder {
    pub fn new(suborder_id: &str) -> Self {
        Self {
            order: RecycleOrder::new(
                1,
                suborder_id.to_string(),
                100,
                ResourceType::Vm,
                RecycleType::Expired,
            ),
        }
    }

    pub fn with_order_id(mut self, order_id: i64) -> Self {
        self.order.order_id = order_id;
        self
    }

    pub fn with_biz(mut self, bk_biz_id: i64) -> Self {
        self.order.bk_biz_id = bk_biz_id;
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.order.resource_type = resource_type;
        self
    }

    pub fn with_recycle_type(mut self, recycle_type: RecycleType) -> Self {
        self.order.recycle_type = recycle_type;
        self
    }

    /// 同时设置阶段
    pub fn with_status(mut self, status: RecycleStatus) -> Self {
        self.order.status = status;
        self.order.stage = status.stage();
        self
    }

    /// 设置总数，全部计为处理中
    pub fn with_total(mut self, total: i32) -> Self {
        self.order.total_num = total;
        self.order.pending_num = total;
        self.order.success_num = 0;
        self.order.failed_num = 0;
        self
    }

    pub fn with_return_forecast(mut self, return_forecast: bool) -> Self {
        self.order.return_forecast = return_forecast;
        self
    }

    pub fn build(self) -> RecycleOrder {
        self.order
    }
}

/// Builder for creating test RecycleHost entities
pub struct HostBuilder {
    host: RecycleHost,
}

impl HostBuilder {
    pub fn new(order: &RecycleOrder, host_id: i64) -> Self {
        Self {
            host: RecycleHost::new(
                order,
                host_id,
                format!("10.0.{}.{}", host_id / 256, host_id % 256),
                format!("ASSET-{host_id}"),
            ),
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.host.ip = ip.to_string();
        self
    }

    pub fn with_returned_way(mut self, returned_way: ReturnedWay) -> Self {
        self.host.returned_way = returned_way;
        self
    }

    pub fn with_status(mut self, status: RecycleStatus) -> Self {
        self.host.status = status;
        self.host.stage = status.stage();
        self
    }

    pub fn build(self) -> RecycleHost {
        self.host
    }

    /// 为回收单批量生成主机，ID 从 1 开始
    pub fn many(order: &RecycleOrder, count: i64, returned_way: ReturnedWay) -> Vec<RecycleHost> {
        (1..=count)
            .map(|id| {
                HostBuilder::new(order, id)
                    .with_returned_way(returned_way)
                    .build()
            })
            .collect()
    }
}
