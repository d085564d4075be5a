//! 检验结果服务主程序

use anyhow::{Context, Result};
use clap::Parser;
use lis_admin::config::LisConfig;
use lis_admin::{init_logging, ConfigManager, Metrics};
use lis_database::{DatabasePool, PgStore, PoolSettings};
use lis_web::{AppState, WebServer};
use lis_workflow::{
    ExamWorkflowEngine, InMemoryCatalog, InMemoryExamStore, InMemoryPatientStore,
    InMemoryReferenceTable, RegistryService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 检验结果服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "lis-server")]
#[command(about = "LIS (Laboratory Information System) 检验结果服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 使用内存存储运行，不连接数据库
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::load(args.config.as_deref())?.with_overrides(args.port, args.log_level)?;
    let config_source = manager.source_description();
    let config = manager.into_config();

    // 初始化日志
    init_logging(&config.logging)?;

    info!("启动检验结果服务...");
    info!("  配置来源: {}", config_source);
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  默认报表项目: {:?}", config.reports.default_procedures);

    let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);
    let (engine, registry) = if args.in_memory {
        warn!("Running with in-memory stores, data will not survive a restart");
        build_in_memory(&config)
    } else {
        build_with_database(&config).await?
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let server = WebServer::new(addr, AppState::new(engine, registry, metrics));
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}

fn build_in_memory(config: &LisConfig) -> (ExamWorkflowEngine, RegistryService) {
    let exams = Arc::new(InMemoryExamStore::new());
    let engine = ExamWorkflowEngine::new(exams.clone(), Arc::new(InMemoryReferenceTable::with_default_bands()));
    let registry = RegistryService::new(
        Arc::new(InMemoryPatientStore::new()),
        Arc::new(InMemoryCatalog::with_defaults()),
        exams,
        config.reports.default_procedures.clone(),
    );
    (engine, registry)
}

async fn build_with_database(config: &LisConfig) -> Result<(ExamWorkflowEngine, RegistryService)> {
    let settings = PoolSettings {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout: config.database.connect_timeout(),
    };
    let pool = DatabasePool::connect(&settings)
        .await
        .context("Failed to connect to database")?;
    let store = Arc::new(PgStore::new(pool));

    if config.database.run_migrations {
        store.prepare().await.context("Failed to prepare database schema")?;
    }

    let engine = ExamWorkflowEngine::new(store.clone(), store.clone());
    let registry = RegistryService::new(
        store.clone(),
        store.clone(),
        store,
        config.reports.default_procedures.clone(),
    );
    Ok((engine, registry))
}
