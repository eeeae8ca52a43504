use async_trait::async_trait;
use chrono::Utc;
use recycler_domain::{
    DetectTask, HostFilter, HostUpdate, OrderFilter, OrderUpdate, RecycleHost, RecycleOrder,
    RecycleStore, Transition,
};
use recycler_errors::{RecycleError, RecycleResult};
use sqlx::{
    sqlite::{SqliteConnection, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS recycle_orders (
    suborder_id TEXT PRIMARY KEY,
    order_id INTEGER NOT NULL,
    bk_biz_id INTEGER NOT NULL,
    resource_type TEXT NOT NULL,
    recycle_type TEXT NOT NULL,
    stage TEXT NOT NULL,
    status TEXT NOT NULL,
    total_num INTEGER NOT NULL DEFAULT 0,
    success_num INTEGER NOT NULL DEFAULT 0,
    pending_num INTEGER NOT NULL DEFAULT 0,
    failed_num INTEGER NOT NULL DEFAULT 0,
    return_forecast BOOLEAN NOT NULL DEFAULT 0,
    handler TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL DEFAULT '',
    remark TEXT NOT NULL DEFAULT '',
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS recycle_hosts (
    suborder_id TEXT NOT NULL,
    host_id INTEGER NOT NULL,
    order_id INTEGER NOT NULL,
    bk_biz_id INTEGER NOT NULL,
    ip TEXT NOT NULL,
    asset_id TEXT NOT NULL,
    returned_way TEXT NOT NULL,
    stage TEXT NOT NULL,
    status TEXT NOT NULL,
    updated_at DATETIME NOT NULL,
    PRIMARY KEY (suborder_id, host_id)
);

CREATE TABLE IF NOT EXISTS detect_tasks (
    task_id TEXT PRIMARY KEY,
    suborder_id TEXT NOT NULL,
    host_id INTEGER NOT NULL,
    ip TEXT NOT NULL,
    status TEXT NOT NULL,
    total_num INTEGER NOT NULL DEFAULT 0,
    success_num INTEGER NOT NULL DEFAULT 0,
    pending_num INTEGER NOT NULL DEFAULT 0,
    failed_num INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recycle_orders_status ON recycle_orders(status);
CREATE INDEX IF NOT EXISTS idx_recycle_orders_order_id ON recycle_orders(order_id);
CREATE INDEX IF NOT EXISTS idx_recycle_hosts_status ON recycle_hosts(suborder_id, status);
CREATE INDEX IF NOT EXISTS idx_detect_tasks_suborder ON detect_tasks(suborder_id);
"#;

pub struct SqliteRecycleStore {
    pool: SqlitePool,
}

impl SqliteRecycleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建表与索引，可重复执行
    pub async fn migrate(&self) -> RecycleResult<()> {
        debug!("Running SQLite recycle store migrations");
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: &SqliteRow) -> RecycleResult<RecycleOrder> {
        Ok(RecycleOrder {
            order_id: row.try_get("order_id")?,
            suborder_id: row.try_get("suborder_id")?,
            bk_biz_id: row.try_get("bk_biz_id")?,
            resource_type: parse_column(row, "resource_type")?,
            recycle_type: parse_column(row, "recycle_type")?,
            stage: parse_column(row, "stage")?,
            status: parse_column(row, "status")?,
            total_num: row.try_get("total_num")?,
            success_num: row.try_get("success_num")?,
            pending_num: row.try_get("pending_num")?,
            failed_num: row.try_get("failed_num")?,
            return_forecast: row.try_get("return_forecast")?,
            handler: row.try_get("handler")?,
            message: row.try_get("message")?,
            remark: row.try_get("remark")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_host(row: &SqliteRow) -> RecycleResult<RecycleHost> {
        Ok(RecycleHost {
            host_id: row.try_get("host_id")?,
            suborder_id: row.try_get("suborder_id")?,
            order_id: row.try_get("order_id")?,
            bk_biz_id: row.try_get("bk_biz_id")?,
            ip: row.try_get("ip")?,
            asset_id: row.try_get("asset_id")?,
            returned_way: parse_column(row, "returned_way")?,
            stage: parse_column(row, "stage")?,
            status: parse_column(row, "status")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_detect_task(row: &SqliteRow) -> RecycleResult<DetectTask> {
        Ok(DetectTask {
            task_id: row.try_get("task_id")?,
            suborder_id: row.try_get("suborder_id")?,
            host_id: row.try_get("host_id")?,
            ip: row.try_get("ip")?,
            status: parse_column(row, "status")?,
            total_num: row.try_get("total_num")?,
            success_num: row.try_get("success_num")?,
            pending_num: row.try_get("pending_num")?,
            failed_num: row.try_get("failed_num")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// 状态类字段以字符串落库
fn parse_column<T>(row: &SqliteRow, column: &str) -> RecycleResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(RecycleError::Serialization)
}

fn map_insert_error(err: sqlx::Error, what: String) -> RecycleError {
    let duplicated = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if duplicated {
        RecycleError::validation_error(format!("{what} 已存在"))
    } else {
        err.into()
    }
}

fn push_order_where(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(suborder_id) = &filter.suborder_id {
        qb.push(" AND suborder_id = ").push_bind(suborder_id.clone());
    }
    if let Some(order_id) = filter.order_id {
        qb.push(" AND order_id = ").push_bind(order_id);
    }
    if !filter.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut separated = qb.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
}

fn push_order_set(qb: &mut QueryBuilder<'_, Sqlite>, update: &OrderUpdate) {
    qb.push("UPDATE recycle_orders SET updated_at = ")
        .push_bind(Utc::now());
    if let Some(stage) = update.stage {
        qb.push(", stage = ").push_bind(stage.as_str());
    }
    if let Some(status) = update.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    if let Some(message) = &update.message {
        qb.push(", message = ").push_bind(message.clone());
    }
    if let Some(handler) = &update.handler {
        qb.push(", handler = ").push_bind(handler.clone());
    }
    if let Some(remark) = &update.remark {
        qb.push(", remark = ").push_bind(remark.clone());
    }
    if let Some(total) = update.total_num {
        qb.push(", total_num = ").push_bind(total);
    }
    if let Some(success) = update.success_num {
        qb.push(", success_num = ").push_bind(success);
    }
    if let Some(pending) = update.pending_num {
        qb.push(", pending_num = ").push_bind(pending);
    }
    if let Some(failed) = update.failed_num {
        qb.push(", failed_num = ").push_bind(failed);
    }
}

fn push_host_where(qb: &mut QueryBuilder<'_, Sqlite>, filter: &HostFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(suborder_id) = &filter.suborder_id {
        qb.push(" AND suborder_id = ").push_bind(suborder_id.clone());
    }
    if !filter.host_ids.is_empty() {
        qb.push(" AND host_id IN (");
        let mut separated = qb.separated(", ");
        for host_id in &filter.host_ids {
            separated.push_bind(*host_id);
        }
        separated.push_unseparated(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn host_update_query(filter: &HostFilter, update: &HostUpdate) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("UPDATE recycle_hosts SET stage = ");
    qb.push_bind(update.stage.as_str())
        .push(", status = ")
        .push_bind(update.status.as_str())
        .push(", updated_at = ")
        .push_bind(Utc::now());
    push_host_where(&mut qb, filter);
    qb
}

fn order_update_query(filter: &OrderFilter, update: &OrderUpdate) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("");
    push_order_set(&mut qb, update);
    push_order_where(&mut qb, filter);
    qb
}

async fn insert_order(conn: &mut SqliteConnection, order: &RecycleOrder) -> RecycleResult<()> {
    sqlx::query(
        r#"
        INSERT INTO recycle_orders (
            suborder_id, order_id, bk_biz_id, resource_type, recycle_type, stage, status,
            total_num, success_num, pending_num, failed_num, return_forecast,
            handler, message, remark, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order.suborder_id)
    .bind(order.order_id)
    .bind(order.bk_biz_id)
    .bind(order.resource_type.as_str())
    .bind(order.recycle_type.as_str())
    .bind(order.stage.as_str())
    .bind(order.status.as_str())
    .bind(order.total_num)
    .bind(order.success_num)
    .bind(order.pending_num)
    .bind(order.failed_num)
    .bind(order.return_forecast)
    .bind(&order.handler)
    .bind(&order.message)
    .bind(&order.remark)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_insert_error(e, format!("回收单 {}", order.suborder_id)))?;
    Ok(())
}

async fn insert_hosts(conn: &mut SqliteConnection, hosts: &[RecycleHost]) -> RecycleResult<()> {
    for host in hosts {
        sqlx::query(
            r#"
            INSERT INTO recycle_hosts (
                suborder_id, host_id, order_id, bk_biz_id, ip, asset_id,
                returned_way, stage, status, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&host.suborder_id)
        .bind(host.host_id)
        .bind(host.order_id)
        .bind(host.bk_biz_id)
        .bind(&host.ip)
        .bind(&host.asset_id)
        .bind(host.returned_way.as_str())
        .bind(host.stage.as_str())
        .bind(host.status.as_str())
        .bind(host.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            map_insert_error(
                e,
                format!("回收单 {} 的主机 {}", host.suborder_id, host.host_id),
            )
        })?;
    }
    Ok(())
}

#[async_trait]
impl RecycleStore for SqliteRecycleStore {
    #[instrument(skip(self, order), fields(suborder_id = %order.suborder_id))]
    async fn create_order(&self, order: &RecycleOrder) -> RecycleResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_order(&mut conn, order).await?;
        debug!("创建回收单: {}", order.suborder_id);
        Ok(())
    }

    async fn get_order(&self, suborder_id: &str) -> RecycleResult<Option<RecycleOrder>> {
        let row = sqlx::query("SELECT * FROM recycle_orders WHERE suborder_id = ?")
            .bind(suborder_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> RecycleResult<Vec<RecycleOrder>> {
        let mut qb = QueryBuilder::new("SELECT * FROM recycle_orders");
        push_order_where(&mut qb, filter);
        qb.push(" ORDER BY created_at, suborder_id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn update_order(&self, filter: &OrderFilter, update: &OrderUpdate) -> RecycleResult<u64> {
        let result = order_update_query(filter, update)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_hosts(&self, hosts: &[RecycleHost]) -> RecycleResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_hosts(&mut tx, hosts).await?;
        tx.commit().await?;
        Ok(())
    }

    /// 同一事务内写入回收单与主机，出错时事务随 drop 回滚
    #[instrument(skip_all, fields(suborder_id = %order.suborder_id))]
    async fn create_order_with_hosts(
        &self,
        order: &RecycleOrder,
        hosts: &[RecycleHost],
    ) -> RecycleResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_order(&mut tx, order).await?;
        insert_hosts(&mut tx, hosts).await?;
        tx.commit().await?;
        debug!("创建回收单: {}，主机 {} 台", order.suborder_id, hosts.len());
        Ok(())
    }

    async fn list_hosts(&self, filter: &HostFilter) -> RecycleResult<Vec<RecycleHost>> {
        let mut qb = QueryBuilder::new("SELECT * FROM recycle_hosts");
        push_host_where(&mut qb, filter);
        qb.push(" ORDER BY rowid");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_host).collect()
    }

    async fn update_hosts(&self, filter: &HostFilter, update: &HostUpdate) -> RecycleResult<u64> {
        let result = host_update_query(filter, update)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_detect_tasks(&self, tasks: &[DetectTask]) -> RecycleResult<()> {
        let mut tx = self.pool.begin().await?;
        for task in tasks {
            sqlx::query(
                r#"
                INSERT INTO detect_tasks (
                    task_id, suborder_id, host_id, ip, status,
                    total_num, success_num, pending_num, failed_num, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&task.task_id)
            .bind(&task.suborder_id)
            .bind(task.host_id)
            .bind(&task.ip)
            .bind(task.status.as_str())
            .bind(task.total_num)
            .bind(task.success_num)
            .bind(task.pending_num)
            .bind(task.failed_num)
            .bind(task.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_detect_tasks(&self, suborder_id: &str) -> RecycleResult<Vec<DetectTask>> {
        let rows = sqlx::query("SELECT * FROM detect_tasks WHERE suborder_id = ? ORDER BY rowid")
            .bind(suborder_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_detect_task).collect()
    }

    #[instrument(skip(self, transition), fields(suborder_id = ?transition.order_filter.suborder_id))]
    async fn apply_transition(&self, transition: &Transition) -> RecycleResult<bool> {
        let mut tx = self.pool.begin().await?;

        let affected = order_update_query(&transition.order_filter, &transition.order_update)
            .build()
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            debug!("回收单状态条件不满足，放弃本次流转");
            return Ok(false);
        }

        if let Some((filter, update)) = &transition.hosts {
            host_update_query(filter, update)
                .build()
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recycler_domain::{RecycleStatus, RecycleType, ResourceType, ReturnedWay};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteRecycleStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRecycleStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    async fn seeded() -> (SqliteRecycleStore, RecycleOrder) {
        let store = store().await;
        let order = RecycleOrder::new(
            7,
            "SUB-7".to_string(),
            300,
            ResourceType::PhysicalMachine,
            RecycleType::Dissolve,
        );
        store.create_order(&order).await.unwrap();
        let hosts: Vec<_> = (1..=3)
            .map(|i| {
                RecycleHost::new(&order, i, format!("10.1.0.{i}"), format!("PM-{i}"))
                    .with_returned_way(ReturnedWay::ResourcePool)
            })
            .collect();
        store.create_hosts(&hosts).await.unwrap();
        (store, order)
    }

    #[tokio::test]
    async fn test_order_persisted_fields() {
        let (store, order) = seeded().await;
        let loaded = store.get_order("SUB-7").await.unwrap().unwrap();
        assert_eq!(loaded.suborder_id, order.suborder_id);
        assert_eq!(loaded.resource_type, ResourceType::PhysicalMachine);
        assert_eq!(loaded.status, RecycleStatus::Uncommit);
        assert_eq!(loaded.handler, order.handler);
        assert!(store.get_order("SUB-8").await.unwrap().is_none());

        let err = store.create_order(&order).await.unwrap_err();
        assert!(matches!(err, RecycleError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_list_orders_by_status() {
        let (store, _) = seeded().await;
        let uncommitted = store
            .list_orders(&OrderFilter::default().with_statuses(vec![RecycleStatus::Uncommit]))
            .await
            .unwrap();
        assert_eq!(uncommitted.len(), 1);

        let resumable = store
            .list_orders(&OrderFilter::default().with_statuses(vec![
                RecycleStatus::Committed,
                RecycleStatus::Detecting,
            ]))
            .await
            .unwrap();
        assert!(resumable.is_empty());
    }

    #[tokio::test]
    async fn test_apply_transition_commits_order_and_hosts() {
        let (store, _) = seeded().await;
        let transition = Transition::new(
            "SUB-7",
            RecycleStatus::Uncommit,
            OrderUpdate::to_status(RecycleStatus::Committed)
                .with_total(3)
                .with_counts(0, 3, 0),
            true,
        );
        assert!(store.apply_transition(&transition).await.unwrap());
        assert!(!store.apply_transition(&transition).await.unwrap());

        let order = store.get_order("SUB-7").await.unwrap().unwrap();
        assert_eq!(order.status, RecycleStatus::Committed);
        assert_eq!(order.pending_num, 3);
        assert!(order.counts_consistent());

        let hosts = store.list_hosts(&HostFilter::by_suborder("SUB-7")).await.unwrap();
        assert_eq!(hosts.len(), 3);
        assert!(hosts.iter().all(|h| h.status == RecycleStatus::Committed));
        assert!(hosts.iter().all(|h| h.returned_way == ReturnedWay::ResourcePool));
    }

    #[tokio::test]
    async fn test_rejected_transition_rolls_back() {
        let (store, _) = seeded().await;
        let transition = Transition::new(
            "SUB-7",
            RecycleStatus::Transiting,
            OrderUpdate::to_status(RecycleStatus::Done),
            true,
        );
        assert!(!store.apply_transition(&transition).await.unwrap());
        let hosts = store
            .list_hosts(&HostFilter::by_suborder("SUB-7").with_status(RecycleStatus::Done))
            .await
            .unwrap();
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_with_hosts_rolls_back_on_host_conflict() {
        let store = store().await;
        let order = RecycleOrder::new(9, "SUB-9".to_string(), 300, ResourceType::Vm, RecycleType::Expired);
        let stray = RecycleHost::new(&order, 2, "10.1.9.2".to_string(), "VM-2".to_string());
        store.create_hosts(&[stray.clone()]).await.unwrap();

        let hosts = vec![
            RecycleHost::new(&order, 1, "10.1.9.1".to_string(), "VM-1".to_string()),
            stray,
        ];
        let err = store.create_order_with_hosts(&order, &hosts).await.unwrap_err();
        assert!(matches!(err, RecycleError::ValidationError(_)));
        assert!(store.get_order("SUB-9").await.unwrap().is_none());
        assert_eq!(
            store.list_hosts(&HostFilter::by_suborder("SUB-9")).await.unwrap().len(),
            1
        );

        store.create_order_with_hosts(&order, &hosts[..1]).await.unwrap();
        assert!(store.get_order("SUB-9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_hosts_and_detect_tasks() {
        let (store, _) = seeded().await;
        let affected = store
            .update_hosts(
                &HostFilter::by_suborder("SUB-7").with_host_ids(vec![2]),
                &HostUpdate::to_status(RecycleStatus::TransitFailed),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let hosts = store.list_hosts(&HostFilter::by_suborder("SUB-7")).await.unwrap();
        let tasks: Vec<_> = hosts.iter().map(|h| DetectTask::for_host(h, 5)).collect();
        store.create_detect_tasks(&tasks).await.unwrap();

        let loaded = store.list_detect_tasks("SUB-7").await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].pending_num, 5);
    }
}
