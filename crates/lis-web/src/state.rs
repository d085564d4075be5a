//! 请求共享状态

use lis_admin::Metrics;
use lis_workflow::{ExamWorkflowEngine, RegistryService};
use std::sync::Arc;

/// 路由共享状态，各字段内部均为 `Arc`，克隆开销很小
#[derive(Clone)]
pub struct AppState {
    pub engine: ExamWorkflowEngine,
    pub registry: RegistryService,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(engine: ExamWorkflowEngine, registry: RegistryService, metrics: Arc<Metrics>) -> Self {
        Self {
            engine,
            registry,
            metrics,
        }
    }
}
