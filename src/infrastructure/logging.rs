//! 日志系统配置模块
//! 支持结构化日志（JSON）与文本日志，输出到 stderr 或文件
//!
//! stdout 留给命令输出（地址、交易 ID 等），日志一律不写 stdout

use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// 初始化日志系统
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // 设置日志级别过滤器
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level filter")?;

    let json = config.format == "json";

    match &config.log_file_path {
        Some(path) => {
            if let Some(dir) = Path::new(path).parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create log directory {:?}", dir))?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            let writer = Mutex::new(file);

            if json {
                Registry::default()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(writer))
                    .try_init()?;
            } else {
                Registry::default()
                    .with(filter)
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init()?;
            }
        }
        None => {
            if json {
                Registry::default()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init()?;
            } else {
                Registry::default()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init()?;
            }
        }
    }

    Ok(())
}

/// 简化初始化（使用默认配置）
pub fn init_default_logging() {
    let config = LoggingConfig::default();
    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            log_file_path: None,
        };

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, "json");
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.log");
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            log_file_path: Some(path.to_string_lossy().into_owned()),
        };

        // 全局订阅者可能已被其他测试设置，只校验文件被创建
        let _ = init_logging(&config);
        assert!(path.exists());
    }
}
