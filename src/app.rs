use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use recycler_api::create_app;
use recycler_config::AppConfig;
use recycler_dispatcher::{
    standard_registry, Dispatcher, HandlerDeps, OrderController, TransitEngine,
};
use recycler_infrastructure::{init_metrics, CollaboratorClients, DatabaseManager, MetricsCollector};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

/// 每台主机的检测项数量
const DETECT_STEP_COUNT: i32 = 4;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    dispatcher: Arc<Dispatcher>,
    controller: Arc<OrderController>,
}

impl Application {
    /// 按配置组装存储、外部系统客户端、处理器、调度器与控制器
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        if config.observability.metrics_enabled {
            init_metrics(&config.observability.metrics_bind_address)
                .context("启动指标导出失败")?;
        }

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.migrate().await.context("初始化数据库表结构失败")?;
        let store = database.store();
        info!("存储类型: {:?}", database.database_type());

        let clients =
            CollaboratorClients::from_config(&config.collaborators).context("创建外部系统客户端失败")?;
        let metrics = Arc::new(MetricsCollector::new());

        let transit = Arc::new(TransitEngine::new(
            Arc::clone(&store),
            clients.inventory,
            clients.alarm_shield,
            config.transit.clone(),
            Arc::clone(&metrics),
        ));
        let deps = Arc::new(HandlerDeps {
            store,
            detector: clients.detector,
            returner: clients.returner,
            short_rental: clients.short_rental,
            transit,
            remediation: config.remediation.clone(),
            returning_poll_interval: Duration::from_secs(
                config.dispatcher.returning_poll_interval_seconds,
            ),
            detect_step_count: DETECT_STEP_COUNT,
            metrics: Arc::clone(&metrics),
        });

        let dispatcher = Arc::new(Dispatcher::new(
            config.dispatcher.clone(),
            Arc::new(standard_registry(deps)),
            metrics,
        ));
        let controller = Arc::new(OrderController::new(Arc::clone(&dispatcher)));

        Ok(Self {
            config,
            database,
            dispatcher,
            controller,
        })
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.dispatcher.enabled {
            if self.config.dispatcher.resume_on_start {
                self.dispatcher
                    .resume_pending()
                    .await
                    .context("恢复未完成回收单失败")?;
            }
            self.dispatcher.start().await;
        } else {
            warn!("调度器已禁用，只提供 API 服务");
        }

        let api_handle = if self.config.api.enabled {
            let app = create_app(Arc::clone(&self.controller));
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定API地址失败: {}", self.config.api.bind_address))?;
            info!("API服务监听: {}", self.config.api.bind_address);

            let mut api_shutdown = shutdown_rx.resubscribe();
            Some(tokio::spawn(async move {
                let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = api_shutdown.recv().await;
                });
                if let Err(e) = server.await {
                    error!("API服务运行失败: {e}");
                }
            }))
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("开始停止应用组件");

        self.dispatcher
            .shutdown(Duration::from_secs(
                self.config.dispatcher.shutdown_timeout_seconds,
            ))
            .await;
        if let Some(handle) = api_handle {
            if let Err(e) = handle.await {
                error!("等待API服务退出失败: {e}");
            }
        }
        self.database.close().await;

        info!("应用组件已停止");
        Ok(())
    }
}
