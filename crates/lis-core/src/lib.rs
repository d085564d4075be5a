//! # LIS Core
//!
//! 临床检验系统的核心模块，提供基础数据结构、输入校验、错误定义和通用工具。

pub mod error;
pub mod input;
pub mod models;
pub mod utils;

pub use error::{LisError, Result};
pub use input::*;
pub use models::*;
