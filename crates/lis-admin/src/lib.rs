//! # 检验系统管理模块
//!
//! 提供配置加载与校验、日志初始化以及Prometheus指标

pub mod config;
pub mod logging;
pub mod monitoring;

pub use self::config::{ConfigManager, ConfigValidator, LisConfig};
pub use logging::init_logging;
pub use monitoring::Metrics;
