//! Web服务器

use axum::{
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    api_root, cancel_exam, conclude_exam, create_exam, find_patient, get_exam, get_patient, health,
    list_exams, list_methods, list_sites, metrics, register_patient, register_site, report,
};
use crate::state::AppState;

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: build_router(state),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start web server: {}", e))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // 根路径
        .route("/", get(api_root))

        // 健康检查与指标
        .route("/health", get(health))
        .route("/metrics", get(metrics))

        // API路由
        .nest("/api", api_routes())
        .with_state(state)

        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/exams", get(list_exams).post(create_exam))
        .route("/exams/:id", get(get_exam))
        .route("/exams/:id/conclude", put(conclude_exam))
        .route("/exams/:id/cancel", put(cancel_exam))
        .route("/patients", get(find_patient).post(register_patient))
        .route("/patients/:id", get(get_patient))
        .route("/sites", get(list_sites).post(register_site))
        .route("/methods", get(list_methods))
        .route("/reports", get(report))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
