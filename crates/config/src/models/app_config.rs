use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    collaborators::CollaboratorsConfig,
    database::DatabaseConfig,
    dispatcher::DispatcherConfig,
    remediation::RemediationConfig,
    transit::TransitConfig,
};
use crate::validation::ConfigValidator;

/// 未指定配置文件时依次查找
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/recycler.toml",
    "recycler.toml",
    "/etc/recycler/config.toml",
];

/// 环境变量覆盖，例如 `RECYCLER__DISPATCHER__WORKER_COUNT=16`
pub const ENV_PREFIX: &str = "RECYCLER";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub transit: TransitConfig,
    pub remediation: RemediationConfig,
    pub collaborators: CollaboratorsConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.dispatcher.validate()?;
        self.transit.validate()?;
        self.remediation.validate()?;
        self.collaborators.validate()?;
        self.api.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
