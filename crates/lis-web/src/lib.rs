//! # 检验Web服务模块
//!
//! 基于axum的REST接口：检验生命周期、患者与目录登记、报表以及服务端点

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, WebServer};
pub use state::AppState;
