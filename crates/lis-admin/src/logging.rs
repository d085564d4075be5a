//! 日志初始化

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const KNOWN_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 是否为可识别的日志级别（忽略大小写）
pub fn is_known_level(level: &str) -> bool {
    let level = level.trim().to_ascii_lowercase();
    KNOWN_LEVELS.contains(&level.as_str())
}

/// 构造过滤器：`RUST_LOG` 存在时优先，否则使用配置的级别
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(config.level.trim().to_ascii_lowercase())
            .with_context(|| format!("Invalid log level: {}", config.level)),
    }
}

/// 初始化全局tracing订阅器，进程内只能调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Logging initialized at level {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels() {
        assert!(is_known_level("info"));
        assert!(is_known_level(" WARN "));
        assert!(!is_known_level("verbose"));
        assert!(!is_known_level(""));
    }

    #[test]
    fn test_build_filter_from_config() {
        let config = LoggingConfig {
            level: "DEBUG".to_string(),
            ansi: false,
        };
        assert!(build_filter(&config).is_ok());
    }
}
