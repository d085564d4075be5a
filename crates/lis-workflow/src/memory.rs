//! 内存存储实现
//!
//! 用于测试、演示以及不连接数据库的 `--in-memory` 运行模式。

use crate::classification::sort_bands;
use crate::store::{CatalogStore, ExamStore, PatientStore, ReferenceBandLookup};
use async_trait::async_trait;
use chrono::Utc;
use lis_core::procedures::{BLOOD_TYPING, GLUCOSE};
use lis_core::{
    CollectionSite, ExamMethod, ExamResult, ExamStatus, LisError, NewPatient, Patient, Procedure,
    ReferenceBand, Result,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 内存检验结果存储
#[derive(Debug, Default)]
pub struct InMemoryExamStore {
    exams: RwLock<HashMap<Uuid, ExamResult>>,
}

impl InMemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut exams: Vec<ExamResult>) -> Vec<ExamResult> {
        exams.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        exams
    }
}

#[async_trait]
impl ExamStore for InMemoryExamStore {
    async fn insert_exam(&self, exam: &ExamResult) -> Result<()> {
        let mut exams = self.exams.write().await;
        if exams.contains_key(&exam.id) {
            return Err(LisError::Internal(format!("exam {} already exists", exam.id)));
        }
        exams.insert(exam.id, exam.clone());
        Ok(())
    }

    async fn get_exam(&self, id: Uuid) -> Result<Option<ExamResult>> {
        Ok(self.exams.read().await.get(&id).cloned())
    }

    async fn list_exams_by_procedure(&self, procedure_id: i32) -> Result<Vec<ExamResult>> {
        let exams = self.exams.read().await;
        let matching = exams
            .values()
            .filter(|exam| exam.procedure_id == procedure_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(matching))
    }

    async fn list_exams_filtered(&self, procedures: &[i32], sites: &[Uuid]) -> Result<Vec<ExamResult>> {
        let exams = self.exams.read().await;
        let matching = exams
            .values()
            .filter(|exam| procedures.contains(&exam.procedure_id))
            .filter(|exam| {
                sites.is_empty()
                    || exam
                        .collection_site_id
                        .map(|site| sites.contains(&site))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(Self::newest_first(matching))
    }

    async fn update_if_status(&self, expected: ExamStatus, exam: &ExamResult) -> Result<bool> {
        let mut exams = self.exams.write().await;
        match exams.get_mut(&exam.id) {
            Some(stored) if stored.status == expected => {
                *stored = exam.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(LisError::not_found(format!("exam {} not found", exam.id))),
        }
    }
}

/// 内存参考区间表
#[derive(Debug, Default)]
pub struct InMemoryReferenceTable {
    bands: Vec<ReferenceBand>,
}

impl InMemoryReferenceTable {
    pub fn new(bands: Vec<ReferenceBand>) -> Self {
        Self { bands }
    }

    /// 内置血糖参考区间（mg/dL）
    pub fn with_default_bands() -> Self {
        Self::new(default_glucose_bands())
    }
}

#[async_trait]
impl ReferenceBandLookup for InMemoryReferenceTable {
    async fn bands_for(&self, procedure_id: i32, fasting: bool, pregnant: bool) -> Result<Vec<ReferenceBand>> {
        let mut bands: Vec<ReferenceBand> = self
            .bands
            .iter()
            .filter(|b| b.procedure_id == procedure_id && b.fasting == fasting && b.pregnant == pregnant)
            .cloned()
            .collect();
        sort_bands(&mut bands);
        Ok(bands)
    }
}

/// 内置血糖参考区间
///
/// 相邻区间共用端点，端点值归入 `min` 较小的区间。
pub fn default_glucose_bands() -> Vec<ReferenceBand> {
    let band = |fasting, pregnant, label, min, max| ReferenceBand::new(GLUCOSE, fasting, pregnant, label, min, max);
    vec![
        // 空腹，非妊娠
        band(true, false, "Low", 0.0, 70.0).with_note("Hypoglycemia"),
        band(true, false, "Normal", 70.0, 100.0),
        band(true, false, "Impaired fasting glucose", 100.0, 126.0)
            .with_note("Impaired fasting glucose, repeat the test"),
        band(true, false, "Diabetes", 126.0, 600.0).with_note("Result compatible with diabetes"),
        // 非空腹，非妊娠
        band(false, false, "Low", 0.0, 70.0).with_note("Hypoglycemia"),
        band(false, false, "Normal", 70.0, 140.0),
        band(false, false, "Impaired glucose tolerance", 140.0, 200.0)
            .with_note("Impaired glucose tolerance"),
        band(false, false, "Diabetes", 200.0, 600.0).with_note("Result compatible with diabetes"),
        // 空腹，妊娠
        band(true, true, "Low", 0.0, 70.0).with_note("Hypoglycemia"),
        band(true, true, "Normal", 70.0, 92.0),
        band(true, true, "Gestational diabetes", 92.0, 126.0)
            .with_note("Meets gestational diabetes criteria"),
        band(true, true, "Overt diabetes", 126.0, 600.0).with_note("Overt diabetes in pregnancy"),
        // 非空腹，妊娠
        band(false, true, "Low", 0.0, 70.0).with_note("Hypoglycemia"),
        band(false, true, "Normal", 70.0, 140.0),
        band(false, true, "High", 140.0, 600.0).with_note("Refer for oral glucose tolerance test"),
    ]
}

/// 内存患者存储
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn find_patient_by_cpf(&self, cpf: &str) -> Result<Option<Patient>> {
        let patients = self.patients.read().await;
        Ok(patients.values().find(|p| p.cpf == cpf).cloned())
    }

    async fn upsert_patient(&self, new_patient: NewPatient) -> Result<(Patient, bool)> {
        let mut patients = self.patients.write().await;

        if let Some(existing) = patients.values_mut().find(|p| p.cpf == new_patient.cpf) {
            if let Some(phone) = new_patient.phone {
                existing.phone = Some(phone);
                existing.updated_at = Utc::now();
            }
            return Ok((existing.clone(), false));
        }

        let patient = Patient::from_new(new_patient);
        patients.insert(patient.id, patient.clone());
        Ok((patient, true))
    }
}

/// 内存基础目录
#[derive(Debug)]
pub struct InMemoryCatalog {
    sites: RwLock<Vec<CollectionSite>>,
    methods: Vec<ExamMethod>,
    procedures: Vec<Procedure>,
}

impl InMemoryCatalog {
    pub fn new(methods: Vec<ExamMethod>, procedures: Vec<Procedure>) -> Self {
        Self {
            sites: RwLock::new(Vec::new()),
            methods,
            procedures,
        }
    }

    /// 内置血糖与血型两个项目及其方法学
    pub fn with_defaults() -> Self {
        let method = |procedure_id, name: &str, description: &str| ExamMethod {
            id: Uuid::new_v4(),
            procedure_id,
            name: name.to_string(),
            description: Some(description.to_string()),
        };

        Self::new(
            vec![
                method(GLUCOSE, "Glucose oxidase", "Enzymatic colorimetric assay (GOD-PAP)"),
                method(GLUCOSE, "Capillary glucometer", "Point-of-care capillary measurement"),
                method(BLOOD_TYPING, "Tube hemagglutination", "ABO/Rh typing by tube agglutination"),
                method(BLOOD_TYPING, "Gel column agglutination", "ABO/Rh typing by gel centrifugation"),
            ],
            vec![
                Procedure {
                    code: GLUCOSE,
                    description: "Glucose".to_string(),
                },
                Procedure {
                    code: BLOOD_TYPING,
                    description: "Blood typing".to_string(),
                },
            ],
        )
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_sites(&self) -> Result<Vec<CollectionSite>> {
        let mut sites = self.sites.read().await.clone();
        sites.sort_by(|a, b| a.description.cmp(&b.description));
        Ok(sites)
    }

    async fn register_site(&self, description: &str) -> Result<(CollectionSite, bool)> {
        let mut sites = self.sites.write().await;
        let wanted = description.to_uppercase();

        if let Some(existing) = sites.iter().find(|s| s.description.to_uppercase() == wanted) {
            return Ok((existing.clone(), false));
        }

        let site = CollectionSite::new(description.to_string());
        sites.push(site.clone());
        Ok((site, true))
    }

    async fn list_methods(&self, procedure_id: i32) -> Result<Vec<ExamMethod>> {
        let mut methods: Vec<ExamMethod> = self
            .methods
            .iter()
            .filter(|m| m.procedure_id == procedure_id)
            .cloned()
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(methods)
    }

    async fn list_procedures(&self) -> Result<Vec<Procedure>> {
        Ok(self.procedures.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{classify_numeric, VerdictKind};

    #[tokio::test]
    async fn test_update_if_status_rejects_stale_expectation() {
        let store = InMemoryExamStore::new();
        let exam = ExamResult::pending(lis_core::NewExam {
            procedure_id: GLUCOSE,
            subject_id: Uuid::new_v4(),
            collection_site_id: None,
            collected_at: None,
            fasting: None,
            pregnant: None,
            observation: None,
        });
        store.insert_exam(&exam).await.unwrap();

        let mut canceled = exam.clone();
        canceled.status = ExamStatus::Canceled;
        canceled.cancel_reason = Some("duplicate".to_string());
        assert!(store.update_if_status(ExamStatus::Pending, &canceled).await.unwrap());

        let mut concluded = exam.clone();
        concluded.status = ExamStatus::Concluded;
        assert!(!store.update_if_status(ExamStatus::Pending, &concluded).await.unwrap());

        let stored = store.get_exam(exam.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExamStatus::Canceled);
    }

    #[tokio::test]
    async fn test_reference_table_filters_by_key_and_sorts() {
        let table = InMemoryReferenceTable::new(vec![
            ReferenceBand::new(GLUCOSE, true, false, "Normal", 70.0, 99.0),
            ReferenceBand::new(GLUCOSE, true, false, "Low", 0.0, 69.0),
            ReferenceBand::new(GLUCOSE, false, false, "Other", 0.0, 10.0),
            ReferenceBand::new(GLUCOSE, true, true, "Pregnant", 0.0, 10.0),
        ]);

        let bands = table.bands_for(GLUCOSE, true, false).await.unwrap();
        let labels: Vec<&str> = bands.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Low", "Normal"]);

        assert!(table.bands_for(BLOOD_TYPING, false, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_bands_cover_every_key() {
        let table = InMemoryReferenceTable::with_default_bands();
        for fasting in [true, false] {
            for pregnant in [true, false] {
                assert!(!table.bands_for(GLUCOSE, fasting, pregnant).await.unwrap().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_default_bands_leave_no_gaps() {
        let table = InMemoryReferenceTable::with_default_bands();
        for fasting in [true, false] {
            for pregnant in [true, false] {
                let bands = table.bands_for(GLUCOSE, fasting, pregnant).await.unwrap();
                let first = (bands[0].min * 100.0).round() as i64;
                let last = (bands[bands.len() - 1].max * 100.0).round() as i64;

                // 以0.05为步长扫描整个覆盖范围
                for hundredths in (first..=last).step_by(5) {
                    let value = hundredths as f64 / 100.0;
                    let classification = classify_numeric(bands.clone(), value);
                    assert_eq!(
                        classification.kind,
                        Some(VerdictKind::WithinBand),
                        "fasting={} pregnant={} value={} verdict={:?}",
                        fasting,
                        pregnant,
                        value,
                        classification.verdict
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_default_band_edges_belong_to_lower_band() {
        let table = InMemoryReferenceTable::with_default_bands();
        let bands = table.bands_for(GLUCOSE, true, false).await.unwrap();

        let verdict = |value| classify_numeric(bands.clone(), value).verdict;
        assert_eq!(verdict(69.95).as_deref(), Some("Hypoglycemia"));
        assert_eq!(verdict(70.0).as_deref(), Some("Hypoglycemia"));
        assert_eq!(verdict(99.95).as_deref(), Some("within reference band \"Normal\""));
        assert_eq!(verdict(125.95).as_deref(), Some("Impaired fasting glucose, repeat the test"));
        assert_eq!(verdict(126.5).as_deref(), Some("Result compatible with diabetes"));
        assert_eq!(verdict(600.5).as_deref(), Some(crate::ABOVE_MAXIMUM));
    }

    #[tokio::test]
    async fn test_register_site_is_case_insensitive() {
        let catalog = InMemoryCatalog::with_defaults();

        let (first, created) = catalog.register_site("UBS Centro").await.unwrap();
        assert!(created);
        let (second, created) = catalog.register_site("ubs centro").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(catalog.list_sites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_methods_by_procedure() {
        let catalog = InMemoryCatalog::with_defaults();
        let methods = catalog.list_methods(GLUCOSE).await.unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name, "Capillary glucometer");
        assert!(catalog.list_methods(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_patient_by_cpf() {
        let store = InMemoryPatientStore::new();
        let new_patient = NewPatient {
            cpf: "12345678901".to_string(),
            name: "Maria Oliveira".to_string(),
            birth_date: None,
            sex: None,
            rg: None,
            rg_uf: None,
            phone: None,
        };

        let (patient, created) = store.upsert_patient(new_patient.clone()).await.unwrap();
        assert!(created);

        let again = NewPatient {
            name: "Other Name".to_string(),
            phone: Some("65999999999".to_string()),
            ..new_patient
        };
        let (same, created) = store.upsert_patient(again).await.unwrap();
        assert!(!created);
        assert_eq!(same.id, patient.id);
        assert_eq!(same.name, "Maria Oliveira");
        assert_eq!(same.phone.as_deref(), Some("65999999999"));
    }
}
