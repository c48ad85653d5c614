//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{
    chain_config::Network,
    transaction::{DEFAULT_BTC_FEE_SATS, DEFAULT_ETH_GAS_LIMIT},
};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bitcoin: BitcoinConfig,
    #[serde(default)]
    pub ethereum: EthereumConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bitcoin 网关配置（Esplora）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    pub network: Network,
    pub esplora_url: String,
    pub testnet_esplora_url: String,
    /// 默认固定手续费（satoshi）
    pub default_fee_sats: u64,
}

/// Ethereum 网关配置（JSON-RPC）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EthereumConfig {
    pub network: Network,
    pub rpc_url: String,
    pub testnet_rpc_url: String,
    pub default_gas_limit: u64,
}

/// 外部服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// 派生 / 加密服务超时（秒）
    pub timeout_secs: u64,
    /// 链网关 HTTP 超时（秒）
    pub gateway_timeout_secs: u64,
    /// 外部 core 可执行文件；未配置时使用进程内实现
    pub core_binary: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub log_file_path: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            network: env_parse("BTC_NETWORK").unwrap_or_default(),
            esplora_url: std::env::var("BTC_ESPLORA_URL")
                .unwrap_or_else(|_| "https://blockstream.info/api".into()),
            testnet_esplora_url: std::env::var("BTC_TESTNET_ESPLORA_URL")
                .unwrap_or_else(|_| "https://blockstream.info/testnet/api".into()),
            default_fee_sats: env_parse("BTC_DEFAULT_FEE_SATS").unwrap_or(DEFAULT_BTC_FEE_SATS),
        }
    }
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            network: env_parse("ETH_NETWORK").unwrap_or_default(),
            rpc_url: std::env::var("ETH_RPC_URL")
                .unwrap_or_else(|_| "https://ethereum-rpc.publicnode.com".into()),
            testnet_rpc_url: std::env::var("ETH_TESTNET_RPC_URL")
                .unwrap_or_else(|_| "https://ethereum-sepolia-rpc.publicnode.com".into()),
            default_gas_limit: env_parse("ETH_DEFAULT_GAS_LIMIT").unwrap_or(DEFAULT_ETH_GAS_LIMIT),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: env_parse("SERVICE_TIMEOUT_SECS").unwrap_or(5),
            gateway_timeout_secs: env_parse("GATEWAY_TIMEOUT_SECS").unwrap_or(30),
            core_binary: std::env::var("KEY_CORE_BINARY").ok(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl BitcoinConfig {
    pub fn esplora_url_for(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.esplora_url,
            Network::Testnet => &self.testnet_esplora_url,
        }
    }
}

impl EthereumConfig {
    pub fn rpc_url_for(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.rpc_url,
            Network::Testnet => &self.testnet_rpc_url,
        }
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bitcoin: BitcoinConfig::default(),
            ethereum: EthereumConfig::default(),
            services: ServicesConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    ///
    /// 文件中缺失的段落回落到环境变量默认值
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            } else {
                anyhow::bail!("Config file not found: {:?}", path.as_ref());
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("BTC_ESPLORA_URL", &self.bitcoin.esplora_url),
            ("BTC_TESTNET_ESPLORA_URL", &self.bitcoin.testnet_esplora_url),
            ("ETH_RPC_URL", &self.ethereum.rpc_url),
            ("ETH_TESTNET_RPC_URL", &self.ethereum.testnet_rpc_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.ethereum.default_gas_limit < DEFAULT_ETH_GAS_LIMIT {
            anyhow::bail!(
                "ETH_DEFAULT_GAS_LIMIT must be at least {}",
                DEFAULT_ETH_GAS_LIMIT
            );
        }

        if self.services.timeout_secs == 0 || self.services.gateway_timeout_secs == 0 {
            anyhow::bail!("SERVICE_TIMEOUT_SECS and GATEWAY_TIMEOUT_SECS must be positive");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
