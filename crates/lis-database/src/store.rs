//! 工作流存储接口的PostgreSQL实现

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;
use async_trait::async_trait;
use lis_core::{
    CollectionSite, ExamMethod, ExamResult, ExamStatus, NewPatient, Patient, Procedure,
    ReferenceBand, Result,
};
use lis_workflow::store::{CatalogStore, ExamStore, PatientStore, ReferenceBandLookup};
use uuid::Uuid;

/// 基于连接池的统一存储
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DatabasePool,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }

    /// 建表并写入内置数据
    pub async fn prepare(&self) -> Result<()> {
        let queries = self.queries();
        queries.create_tables().await?;
        queries.seed_reference_data().await
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn insert_exam(&self, exam: &ExamResult) -> Result<()> {
        self.queries().insert_exam(exam).await
    }

    async fn get_exam(&self, id: Uuid) -> Result<Option<ExamResult>> {
        self.queries().get_exam_by_id(&id).await
    }

    async fn list_exams_by_procedure(&self, procedure_id: i32) -> Result<Vec<ExamResult>> {
        self.queries().get_exams_by_procedure(procedure_id).await
    }

    async fn list_exams_filtered(&self, procedures: &[i32], sites: &[Uuid]) -> Result<Vec<ExamResult>> {
        self.queries().get_exams_filtered(procedures, sites).await
    }

    async fn update_if_status(&self, expected: ExamStatus, exam: &ExamResult) -> Result<bool> {
        self.queries().update_exam_if_status(expected, exam).await
    }
}

#[async_trait]
impl ReferenceBandLookup for PgStore {
    async fn bands_for(&self, procedure_id: i32, fasting: bool, pregnant: bool) -> Result<Vec<ReferenceBand>> {
        self.queries().get_reference_bands(procedure_id, fasting, pregnant).await
    }
}

#[async_trait]
impl PatientStore for PgStore {
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        self.queries().get_patient_by_id(&id).await
    }

    async fn find_patient_by_cpf(&self, cpf: &str) -> Result<Option<Patient>> {
        self.queries().get_patient_by_cpf(cpf).await
    }

    async fn upsert_patient(&self, patient: NewPatient) -> Result<(Patient, bool)> {
        self.queries().upsert_patient(&patient).await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_sites(&self) -> Result<Vec<CollectionSite>> {
        self.queries().get_collection_sites().await
    }

    async fn register_site(&self, description: &str) -> Result<(CollectionSite, bool)> {
        self.queries().register_collection_site(description).await
    }

    async fn list_methods(&self, procedure_id: i32) -> Result<Vec<ExamMethod>> {
        self.queries().get_methods_by_procedure(procedure_id).await
    }

    async fn list_procedures(&self) -> Result<Vec<Procedure>> {
        self.queries().get_procedures().await
    }
}
