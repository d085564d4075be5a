//! 存储接口
//!
//! 工作流引擎只依赖这些 trait，具体实现由调用方注入（内存实现见 [`crate::memory`]，
//! PostgreSQL 实现见 `lis-database`）。

use async_trait::async_trait;
use lis_core::{
    CollectionSite, ExamMethod, ExamResult, ExamStatus, NewPatient, Patient, Procedure,
    ReferenceBand, Result,
};
use uuid::Uuid;

/// 检验结果存储
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// 插入新记录
    async fn insert_exam(&self, exam: &ExamResult) -> Result<()>;

    /// 按ID读取
    async fn get_exam(&self, id: Uuid) -> Result<Option<ExamResult>>;

    /// 按项目列出，采集时间倒序
    async fn list_exams_by_procedure(&self, procedure_id: i32) -> Result<Vec<ExamResult>>;

    /// 按项目和采集点过滤，`sites` 为空时不过滤采集点，采集时间倒序
    async fn list_exams_filtered(&self, procedures: &[i32], sites: &[Uuid]) -> Result<Vec<ExamResult>>;

    /// 仅当存储中的状态仍为 `expected` 时整体写入 `exam`，返回是否写入
    ///
    /// 同一记录的并发转换由这里串行化。
    async fn update_if_status(&self, expected: ExamStatus, exam: &ExamResult) -> Result<bool>;
}

/// 参考区间查询
#[async_trait]
pub trait ReferenceBandLookup: Send + Sync {
    /// 返回指定键下的全部区间，按下限升序
    async fn bands_for(&self, procedure_id: i32, fasting: bool, pregnant: bool) -> Result<Vec<ReferenceBand>>;
}

/// 患者存储
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>>;

    async fn find_patient_by_cpf(&self, cpf: &str) -> Result<Option<Patient>>;

    /// 按CPF登记：已存在时只更新电话（若提供），返回患者及是否新建
    async fn upsert_patient(&self, patient: NewPatient) -> Result<(Patient, bool)>;
}

/// 基础目录：采集点、方法学、检验项目
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<CollectionSite>>;

    /// 按描述（忽略大小写）去重登记，返回采集点及是否新建
    async fn register_site(&self, description: &str) -> Result<(CollectionSite, bool)>;

    async fn list_methods(&self, procedure_id: i32) -> Result<Vec<ExamMethod>>;

    async fn list_procedures(&self) -> Result<Vec<Procedure>>;
}
