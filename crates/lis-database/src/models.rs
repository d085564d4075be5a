//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use lis_core::models::*;
use lis_core::{LisError, Result};
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub cpf: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>, // 存储为代码，转换为Sex枚举
    pub rg: Option<String>,
    pub rg_uf: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            cpf: db_patient.cpf,
            name: db_patient.name,
            birth_date: db_patient.birth_date,
            sex: db_patient.sex.as_deref().and_then(Sex::parse_loose),
            rg: db_patient.rg,
            rg_uf: db_patient.rg_uf,
            phone: db_patient.phone,
            created_at: db_patient.created_at,
            updated_at: db_patient.updated_at,
        }
    }
}

/// 数据库采集点表
#[derive(Debug, FromRow)]
pub struct DbCollectionSite {
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbCollectionSite> for CollectionSite {
    fn from(db_site: DbCollectionSite) -> Self {
        CollectionSite {
            id: db_site.id,
            description: db_site.description,
            created_at: db_site.created_at,
        }
    }
}

/// 数据库方法学表
#[derive(Debug, FromRow)]
pub struct DbExamMethod {
    pub id: Uuid,
    pub procedure_id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<DbExamMethod> for ExamMethod {
    fn from(db_method: DbExamMethod) -> Self {
        ExamMethod {
            id: db_method.id,
            procedure_id: db_method.procedure_id,
            name: db_method.name,
            description: db_method.description,
        }
    }
}

/// 数据库检验项目表
#[derive(Debug, FromRow)]
pub struct DbProcedure {
    pub code: i32,
    pub description: String,
}

impl From<DbProcedure> for Procedure {
    fn from(db_procedure: DbProcedure) -> Self {
        Procedure {
            code: db_procedure.code,
            description: db_procedure.description,
        }
    }
}

/// 数据库检验结果表
#[derive(Debug, FromRow)]
pub struct DbExamResult {
    pub id: Uuid,
    pub procedure_id: i32,
    pub subject_id: Uuid,
    pub collection_site_id: Option<Uuid>,
    pub collected_at: DateTime<Utc>,
    pub fasting: Option<bool>,
    pub pregnant: Option<bool>,
    pub observation: Option<String>,
    pub value: Option<String>,
    pub method_id: Option<Uuid>,
    pub status: String, // PEND / CONC / CANC
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbExamResult> for ExamResult {
    type Error = LisError;

    fn try_from(db_exam: DbExamResult) -> Result<Self> {
        Ok(ExamResult {
            id: db_exam.id,
            procedure_id: db_exam.procedure_id,
            subject_id: db_exam.subject_id,
            collection_site_id: db_exam.collection_site_id,
            collected_at: db_exam.collected_at,
            fasting: db_exam.fasting,
            pregnant: db_exam.pregnant,
            observation: db_exam.observation,
            value: db_exam.value,
            method_id: db_exam.method_id,
            status: db_exam.status.parse()?,
            cancel_reason: db_exam.cancel_reason,
            created_at: db_exam.created_at,
            updated_at: db_exam.updated_at,
        })
    }
}

/// 数据库参考区间表
#[derive(Debug, FromRow)]
pub struct DbReferenceBand {
    pub id: i64,
    pub procedure_id: i32,
    pub fasting: bool,
    pub pregnant: bool,
    pub label: String,
    pub min_value: f64,
    pub max_value: f64,
    pub note: Option<String>,
}

impl From<DbReferenceBand> for ReferenceBand {
    fn from(db_band: DbReferenceBand) -> Self {
        ReferenceBand {
            procedure_id: db_band.procedure_id,
            fasting: db_band.fasting,
            pregnant: db_band.pregnant,
            label: db_band.label,
            min: db_band.min_value,
            max: db_band.max_value,
            note: db_band.note,
        }
    }
}

/// 批量转换检验结果行
pub fn exams_from_rows(rows: Vec<DbExamResult>) -> Result<Vec<ExamResult>> {
    rows.into_iter().map(ExamResult::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_exam(status: &str) -> DbExamResult {
        let now = Utc::now();
        DbExamResult {
            id: Uuid::new_v4(),
            procedure_id: procedures::GLUCOSE,
            subject_id: Uuid::new_v4(),
            collection_site_id: None,
            collected_at: now,
            fasting: Some(true),
            pregnant: None,
            observation: None,
            value: Some("85".to_string()),
            method_id: Some(Uuid::new_v4()),
            status: status.to_string(),
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_exam_row_conversion() {
        let exam = ExamResult::try_from(db_exam("CONC")).unwrap();
        assert_eq!(exam.status, ExamStatus::Concluded);
        assert_eq!(exam.value.as_deref(), Some("85"));
    }

    #[test]
    fn test_exam_row_with_unknown_status_fails() {
        assert!(exams_from_rows(vec![db_exam("PEND"), db_exam("????")]).is_err());
    }

    #[test]
    fn test_band_row_conversion() {
        let band = ReferenceBand::from(DbReferenceBand {
            id: 7,
            procedure_id: procedures::GLUCOSE,
            fasting: true,
            pregnant: false,
            label: "Normal".to_string(),
            min_value: 70.0,
            max_value: 99.0,
            note: None,
        });
        assert!(band.contains(70.0));
        assert_eq!(band.label, "Normal");
    }

    #[test]
    fn test_patient_row_sex_code() {
        let now = Utc::now();
        let patient = Patient::from(DbPatient {
            id: Uuid::new_v4(),
            cpf: "12345678901".to_string(),
            name: "Maria".to_string(),
            birth_date: None,
            sex: Some("F".to_string()),
            rg: None,
            rg_uf: None,
            phone: None,
            created_at: now,
            updated_at: now,
        });
        assert_eq!(patient.sex, Some(Sex::Female));
    }
}
