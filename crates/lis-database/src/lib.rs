//! # 检验数据库模块
//!
//! 负责检验数据的持久化，提供PostgreSQL连接池、建表与查询操作，
//! 以及工作流存储接口的数据库实现。

pub mod connection;
pub mod models;
pub mod queries;
pub mod store;

// 重新导出主要类型
pub use connection::{DatabasePool, PoolSettings};
pub use models::*;
pub use queries::DatabaseQueries;
pub use store::PgStore;
