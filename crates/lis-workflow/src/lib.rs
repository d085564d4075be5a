//! # 检验工作流模块
//!
//! 提供检验结果生命周期管理功能，包括：
//! - 检验状态机：待出结果 → 已出结果 / 已取消
//! - 参考区间判读：根据空腹、妊娠状态将数值结果与参考区间比较
//! - 工作流引擎：校验输入、执行状态转换并以乐观检查写入存储
//! - 登记服务：患者、采集点、方法学与报表

pub mod classification;
pub mod engine;
pub mod memory;
pub mod registry;
pub mod state_machine;
pub mod store;

// 重新导出主要类型
pub use classification::{classify, Classification, VerdictKind, ABOVE_MAXIMUM, BELOW_MINIMUM};
pub use engine::{ExamDetail, ExamWorkflowEngine};
pub use memory::{InMemoryCatalog, InMemoryExamStore, InMemoryPatientStore, InMemoryReferenceTable};
pub use registry::{Registration, RegistryService};
pub use state_machine::{ExamEvent, ExamStateMachine};
pub use store::{CatalogStore, ExamStore, PatientStore, ReferenceBandLookup};
