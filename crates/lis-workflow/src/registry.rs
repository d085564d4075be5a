//! 登记与查询服务
//!
//! 患者登记、采集点、方法学以及检验报表

use crate::store::{CatalogStore, ExamStore, PatientStore};
use lis_core::input::require_procedure_id;
use lis_core::utils::is_valid_cpf;
use lis_core::{
    CollectionSite, ExamMethod, LisError, Patient, RegisterPatientRequest, RegisterSiteRequest,
    ReportFilter, ReportRow, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 登记结果：实体及是否新建
#[derive(Debug, Clone, PartialEq)]
pub struct Registration<T> {
    pub record: T,
    pub created: bool,
}

/// 登记与查询服务
#[derive(Clone)]
pub struct RegistryService {
    patients: Arc<dyn PatientStore>,
    catalog: Arc<dyn CatalogStore>,
    exams: Arc<dyn ExamStore>,
    default_report_procedures: Vec<i32>,
}

impl RegistryService {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        catalog: Arc<dyn CatalogStore>,
        exams: Arc<dyn ExamStore>,
        default_report_procedures: Vec<i32>,
    ) -> Self {
        Self {
            patients,
            catalog,
            exams,
            default_report_procedures,
        }
    }

    /// 按CPF登记患者
    pub async fn register_patient(&self, request: RegisterPatientRequest) -> Result<Registration<Patient>> {
        let new_patient = request.validate()?;
        let (patient, created) = self.patients.upsert_patient(new_patient).await?;

        if created {
            info!("Patient {} registered", patient.id);
        } else {
            info!("Patient {} already registered, reusing record", patient.id);
        }
        Ok(Registration { record: patient, created })
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<Patient> {
        self.patients
            .get_patient(id)
            .await?
            .ok_or_else(|| LisError::not_found(format!("patient {} not found", id)))
    }

    pub async fn find_patient_by_cpf(&self, cpf: &str) -> Result<Patient> {
        let cpf = cpf.trim();
        if !is_valid_cpf(cpf) {
            return Err(LisError::validation("cpf must have exactly 11 digits"));
        }
        self.patients
            .find_patient_by_cpf(cpf)
            .await?
            .ok_or_else(|| LisError::not_found("cpf not found"))
    }

    pub async fn list_sites(&self) -> Result<Vec<CollectionSite>> {
        self.catalog.list_sites().await
    }

    /// 登记采集点，描述相同（忽略大小写）时复用已有记录
    pub async fn register_site(&self, request: RegisterSiteRequest) -> Result<Registration<CollectionSite>> {
        let description = request.validate()?;
        let (site, created) = self.catalog.register_site(&description).await?;

        if created {
            info!("Collection site {} registered: {}", site.id, site.description);
        }
        Ok(Registration { record: site, created })
    }

    pub async fn list_methods(&self, procedure_id: Option<i32>) -> Result<Vec<ExamMethod>> {
        let procedure_id = require_procedure_id(procedure_id)?;
        self.catalog.list_methods(procedure_id).await
    }

    /// 检验报表，未指定项目时使用默认项目
    pub async fn report(&self, filter: ReportFilter) -> Result<Vec<ReportRow>> {
        let filter = filter.with_default_procedures(&self.default_report_procedures);
        let exams = self
            .exams
            .list_exams_filtered(&filter.procedures, &filter.sites)
            .await?;

        let procedures: HashMap<i32, String> = self
            .catalog
            .list_procedures()
            .await?
            .into_iter()
            .map(|p| (p.code, p.description))
            .collect();
        let sites: HashMap<Uuid, String> = self
            .catalog
            .list_sites()
            .await?
            .into_iter()
            .map(|s| (s.id, s.description))
            .collect();

        let rows = exams
            .into_iter()
            .map(|exam| ReportRow {
                exam_id: exam.id,
                procedure_id: exam.procedure_id,
                procedure_description: procedures.get(&exam.procedure_id).cloned(),
                collection_site_id: exam.collection_site_id,
                collection_site: exam.collection_site_id.and_then(|id| sites.get(&id).cloned()),
                value: exam.value,
                status: exam.status,
                collected_at: exam.collected_at,
            })
            .collect();

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCatalog, InMemoryExamStore, InMemoryPatientStore};
    use chrono::{Duration, Utc};
    use lis_core::procedures::{BLOOD_TYPING, DEFAULT_REPORT_PROCEDURES, GLUCOSE};
    use lis_core::{ExamResult, ExamStatus, NewExam};

    struct Fixture {
        registry: RegistryService,
        exams: Arc<InMemoryExamStore>,
    }

    fn fixture() -> Fixture {
        let exams = Arc::new(InMemoryExamStore::new());
        let registry = RegistryService::new(
            Arc::new(InMemoryPatientStore::new()),
            Arc::new(InMemoryCatalog::with_defaults()),
            exams.clone(),
            DEFAULT_REPORT_PROCEDURES.to_vec(),
        );
        Fixture { registry, exams }
    }

    fn exam(procedure_id: i32, site: Option<Uuid>, hours_ago: i64) -> ExamResult {
        ExamResult::pending(NewExam {
            procedure_id,
            subject_id: Uuid::new_v4(),
            collection_site_id: site,
            collected_at: Some(Utc::now() - Duration::hours(hours_ago)),
            fasting: None,
            pregnant: None,
            observation: None,
        })
    }

    fn patient_request(cpf: &str) -> RegisterPatientRequest {
        RegisterPatientRequest {
            cpf: Some(cpf.to_string()),
            name: Some("Maria Oliveira".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_find_patient() {
        let fx = fixture();

        let first = fx.registry.register_patient(patient_request("12345678901")).await.unwrap();
        assert!(first.created);
        let second = fx.registry.register_patient(patient_request("12345678901")).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.record.id, second.record.id);

        let found = fx.registry.find_patient_by_cpf("12345678901").await.unwrap();
        assert_eq!(found.id, first.record.id);
        assert_eq!(fx.registry.get_patient(found.id).await.unwrap().id, found.id);
    }

    #[tokio::test]
    async fn test_patient_lookup_errors() {
        let fx = fixture();
        assert!(matches!(
            fx.registry.find_patient_by_cpf("123").await,
            Err(LisError::Validation(_))
        ));
        assert!(matches!(
            fx.registry.find_patient_by_cpf("99999999999").await,
            Err(LisError::NotFound(_))
        ));
        assert!(matches!(
            fx.registry.get_patient(Uuid::new_v4()).await,
            Err(LisError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_site_requires_description() {
        let fx = fixture();
        let request = RegisterSiteRequest {
            description: Some("  ".to_string()),
        };
        assert!(matches!(
            fx.registry.register_site(request).await,
            Err(LisError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_methods_requires_procedure() {
        let fx = fixture();
        assert_eq!(fx.registry.list_methods(Some(BLOOD_TYPING)).await.unwrap().len(), 2);
        assert!(matches!(fx.registry.list_methods(None).await, Err(LisError::Validation(_))));
    }

    #[tokio::test]
    async fn test_report_filters_and_orders() {
        let fx = fixture();
        let site = fx
            .registry
            .register_site(RegisterSiteRequest {
                description: Some("UBS Centro".to_string()),
            })
            .await
            .unwrap()
            .record;

        let older = exam(GLUCOSE, Some(site.id), 5);
        let newer = exam(BLOOD_TYPING, Some(site.id), 1);
        let elsewhere = exam(GLUCOSE, None, 2);
        let other_procedure = exam(1234, Some(site.id), 3);
        for e in [&older, &newer, &elsewhere, &other_procedure] {
            fx.exams.insert_exam(e).await.unwrap();
        }

        let all_default = fx.registry.report(ReportFilter::default()).await.unwrap();
        let ids: Vec<Uuid> = all_default.iter().map(|r| r.exam_id).collect();
        assert_eq!(ids, vec![newer.id, elsewhere.id, older.id]);

        let by_site = fx
            .registry
            .report(ReportFilter {
                procedures: vec![GLUCOSE],
                sites: vec![site.id],
            })
            .await
            .unwrap();
        assert_eq!(by_site.len(), 1);
        assert_eq!(by_site[0].exam_id, older.id);
        assert_eq!(by_site[0].collection_site.as_deref(), Some("UBS Centro"));
        assert_eq!(by_site[0].procedure_description.as_deref(), Some("Glucose"));
        assert_eq!(by_site[0].status, ExamStatus::Pending);
    }
}
