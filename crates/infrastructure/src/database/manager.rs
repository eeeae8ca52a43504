use recycler_config::DatabaseConfig;
use recycler_domain::RecycleStore;
use recycler_errors::RecycleResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::sqlite::SqliteRecycleStore;
use crate::memory_store::MemoryRecycleStore;

/// 根据连接串识别存储类型
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    Memory,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("memory://") {
            DatabaseType::Memory
        } else {
            DatabaseType::SQLite
        }
    }
}

enum StoreBackend {
    Memory(MemoryRecycleStore),
    SQLite(SqlitePool),
}

/// 统一的存储入口，负责连接、建表和创建回收单存储
pub struct DatabaseManager {
    backend: StoreBackend,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> RecycleResult<Self> {
        let backend = match DatabaseType::from_url(&config.url) {
            DatabaseType::Memory => StoreBackend::Memory(MemoryRecycleStore::new()),
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
                // 内存库的数据只存在于单个连接中，连接必须常驻
                let in_memory = config.url.contains(":memory:");
                let pool_options = if in_memory {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .min_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                } else {
                    SqlitePoolOptions::new()
                        .max_connections(config.max_connections)
                        .min_connections(config.min_connections)
                        .max_lifetime(Duration::from_secs(1800))
                };
                let pool = pool_options
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .connect_with(options)
                    .await?;
                StoreBackend::SQLite(pool)
            }
        };

        let manager = Self { backend };
        info!("存储初始化完成: {:?}", manager.database_type());
        Ok(manager)
    }

    pub fn database_type(&self) -> DatabaseType {
        match self.backend {
            StoreBackend::Memory(_) => DatabaseType::Memory,
            StoreBackend::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn migrate(&self) -> RecycleResult<()> {
        match &self.backend {
            StoreBackend::Memory(_) => Ok(()),
            StoreBackend::SQLite(pool) => SqliteRecycleStore::new(pool.clone()).migrate().await,
        }
    }

    pub fn store(&self) -> Arc<dyn RecycleStore> {
        match &self.backend {
            StoreBackend::Memory(store) => Arc::new(store.clone()),
            StoreBackend::SQLite(pool) => Arc::new(SqliteRecycleStore::new(pool.clone())),
        }
    }

    pub async fn health_check(&self) -> RecycleResult<()> {
        if let StoreBackend::SQLite(pool) = &self.backend {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let StoreBackend::SQLite(pool) = &self.backend {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recycler_domain::{RecycleOrder, RecycleType, ResourceType};

    #[test]
    fn test_database_type_detection() {
        assert_eq!(DatabaseType::from_url("memory://"), DatabaseType::Memory);
        assert_eq!(DatabaseType::from_url("sqlite::memory:"), DatabaseType::SQLite);
        assert_eq!(DatabaseType::from_url("sqlite://recycler.db"), DatabaseType::SQLite);
    }

    #[tokio::test]
    async fn test_sqlite_memory_manager() {
        let manager = DatabaseManager::new(&DatabaseConfig::default()).await.unwrap();
        manager.migrate().await.unwrap();
        manager.health_check().await.unwrap();

        let order = RecycleOrder::new(1, "SUB-1".to_string(), 1, ResourceType::Vm, RecycleType::Expired);
        manager.store().create_order(&order).await.unwrap();
        // 不同的 store 句柄共享同一个连接池
        assert!(manager.store().get_order("SUB-1").await.unwrap().is_some());
        manager.close().await;
    }

    #[tokio::test]
    async fn test_memory_manager_shares_state() {
        let config = DatabaseConfig {
            url: "memory://".to_string(),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.unwrap();
        assert_eq!(manager.database_type(), DatabaseType::Memory);
        manager.migrate().await.unwrap();

        let order = RecycleOrder::new(2, "SUB-2".to_string(), 1, ResourceType::Vm, RecycleType::Expired);
        manager.store().create_order(&order).await.unwrap();
        assert!(manager.store().get_order("SUB-2").await.unwrap().is_some());
    }
}
