//! 各操作的输入模式
//!
//! 传输层反序列化得到的请求体在进入状态机之前统一在这里校验，
//! 校验失败一律返回 [`LisError::Validation`]。

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LisError, Result};
use crate::models::Sex;
use crate::utils::{deserialize_optional_flag, is_valid_cpf, non_blank};

/// 创建检验请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateExamRequest {
    pub procedure_id: Option<i32>,
    pub subject_id: Option<Uuid>,
    pub collection_site_id: Option<Uuid>,
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub fasting: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub pregnant: Option<bool>,
    pub observation: Option<String>,
}

/// 已校验的创建参数
#[derive(Debug, Clone, PartialEq)]
pub struct NewExam {
    pub procedure_id: i32,
    pub subject_id: Uuid,
    pub collection_site_id: Option<Uuid>,
    pub collected_at: Option<DateTime<Utc>>,
    pub fasting: Option<bool>,
    pub pregnant: Option<bool>,
    pub observation: Option<String>,
}

impl CreateExamRequest {
    pub fn validate(self) -> Result<NewExam> {
        let procedure_id = self
            .procedure_id
            .ok_or_else(|| LisError::validation("procedure_id is required"))?;
        if procedure_id <= 0 {
            return Err(LisError::validation("procedure_id must be a positive integer"));
        }
        let subject_id = self
            .subject_id
            .ok_or_else(|| LisError::validation("subject_id is required"))?;

        Ok(NewExam {
            procedure_id,
            subject_id,
            collection_site_id: self.collection_site_id,
            collected_at: self.collected_at,
            fasting: self.fasting,
            pregnant: self.pregnant,
            observation: non_blank(self.observation),
        })
    }
}

/// 出结果请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConcludeExamRequest {
    pub value: Option<String>,
    pub method_id: Option<Uuid>,
}

/// 已校验的出结果参数
#[derive(Debug, Clone, PartialEq)]
pub struct ExamConclusion {
    pub value: String,
    pub method_id: Uuid,
}

impl ConcludeExamRequest {
    pub fn new(value: impl Into<String>, method_id: Uuid) -> Self {
        Self {
            value: Some(value.into()),
            method_id: Some(method_id),
        }
    }

    pub fn validate(self) -> Result<ExamConclusion> {
        let value = match self.value {
            Some(v) if !v.trim().is_empty() => v,
            _ => return Err(LisError::validation("value and method_id are required")),
        };
        let method_id = self
            .method_id
            .ok_or_else(|| LisError::validation("value and method_id are required"))?;

        Ok(ExamConclusion { value, method_id })
    }
}

/// 取消请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelExamRequest {
    pub reason: Option<String>,
}

impl CancelExamRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// 返回去除首尾空白后的取消原因
    pub fn validate(self) -> Result<String> {
        non_blank(self.reason).ok_or_else(|| LisError::validation("cancellation reason is required"))
    }
}

/// 患者登记请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterPatientRequest {
    pub cpf: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub rg: Option<String>,
    pub rg_uf: Option<String>,
    pub phone: Option<String>,
}

/// 已校验的患者登记参数
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub cpf: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub rg: Option<String>,
    pub rg_uf: Option<String>,
    pub phone: Option<String>,
}

impl RegisterPatientRequest {
    pub fn validate(self) -> Result<NewPatient> {
        let cpf = self.cpf.map(|c| c.trim().to_string()).unwrap_or_default();
        if !is_valid_cpf(&cpf) {
            return Err(LisError::validation("cpf must have exactly 11 digits"));
        }
        let name = non_blank(self.name).ok_or_else(|| LisError::validation("name is required"))?;
        let sex = match non_blank(self.sex) {
            Some(raw) => Some(
                Sex::parse_loose(&raw)
                    .ok_or_else(|| LisError::validation(format!("unrecognized sex: {}", raw)))?,
            ),
            None => None,
        };

        Ok(NewPatient {
            cpf,
            name,
            birth_date: self.birth_date,
            sex,
            rg: non_blank(self.rg),
            rg_uf: non_blank(self.rg_uf).map(|uf| uf.to_ascii_uppercase()),
            phone: non_blank(self.phone),
        })
    }
}

/// 采集点登记请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterSiteRequest {
    pub description: Option<String>,
}

impl RegisterSiteRequest {
    pub fn validate(self) -> Result<String> {
        non_blank(self.description).ok_or_else(|| LisError::validation("description is required"))
    }
}

/// 报表过滤条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub procedures: Vec<i32>,
    pub sites: Vec<Uuid>,
}

impl ReportFilter {
    /// 解析逗号分隔的过滤参数，忽略非正数和无法解析的项
    pub fn parse(procedures: Option<&str>, sites: Option<&str>) -> Self {
        let procedures = procedures
            .unwrap_or_default()
            .split(',')
            .filter_map(|p| p.trim().parse::<i32>().ok())
            .filter(|p| *p > 0)
            .collect();
        let sites = sites
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| Uuid::parse_str(s.trim()).ok())
            .collect();

        Self { procedures, sites }
    }

    /// 项目列表为空时使用默认项目
    pub fn with_default_procedures(mut self, defaults: &[i32]) -> Self {
        if self.procedures.is_empty() {
            self.procedures = defaults.to_vec();
        }
        self
    }
}

/// 校验项目代码查询参数
pub fn require_procedure_id(procedure_id: Option<i32>) -> Result<i32> {
    match procedure_id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(LisError::validation("procedure_id is required and must be a positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_requires_procedure_and_subject() {
        let missing_procedure = CreateExamRequest {
            subject_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(missing_procedure.validate(), Err(LisError::Validation(_))));

        let missing_subject = CreateExamRequest {
            procedure_id: Some(3027),
            ..Default::default()
        };
        assert!(matches!(missing_subject.validate(), Err(LisError::Validation(_))));
    }

    #[test]
    fn test_create_flags_accept_numbers_and_null() {
        let request: CreateExamRequest = serde_json::from_value(json!({
            "procedure_id": 3027,
            "subject_id": Uuid::new_v4(),
            "fasting": 1,
            "pregnant": null,
            "observation": "   "
        }))
        .unwrap();

        let new_exam = request.validate().unwrap();
        assert_eq!(new_exam.fasting, Some(true));
        assert_eq!(new_exam.pregnant, None);
        assert_eq!(new_exam.observation, None);
    }

    #[test]
    fn test_conclude_rejects_blank_value() {
        let request = ConcludeExamRequest::new("  ", Uuid::new_v4());
        assert!(matches!(request.validate(), Err(LisError::Validation(_))));

        let request = ConcludeExamRequest {
            value: Some("85".to_string()),
            method_id: None,
        };
        assert!(matches!(request.validate(), Err(LisError::Validation(_))));
    }

    #[test]
    fn test_cancel_reason_is_trimmed() {
        assert_eq!(CancelExamRequest::new("  hemolyzed sample ").validate().unwrap(), "hemolyzed sample");
        assert!(CancelExamRequest::new(" \t ").validate().is_err());
        assert!(CancelExamRequest::default().validate().is_err());
    }

    #[test]
    fn test_register_patient_validation() {
        let request = RegisterPatientRequest {
            cpf: Some("1234567890".to_string()),
            name: Some("Maria".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = RegisterPatientRequest {
            cpf: Some("12345678901".to_string()),
            name: Some(" Maria Oliveira ".to_string()),
            sex: Some("feminino".to_string()),
            rg_uf: Some("mt".to_string()),
            ..Default::default()
        };
        let patient = request.validate().unwrap();
        assert_eq!(patient.name, "Maria Oliveira");
        assert_eq!(patient.sex, Some(Sex::Female));
        assert_eq!(patient.rg_uf.as_deref(), Some("MT"));
    }

    #[test]
    fn test_report_filter_parse() {
        let site = Uuid::new_v4();
        let filter = ReportFilter::parse(Some("3027, -1,abc,4350"), Some(format!("{},nope", site).as_str()));
        assert_eq!(filter.procedures, vec![3027, 4350]);
        assert_eq!(filter.sites, vec![site]);

        let filter = ReportFilter::parse(None, None).with_default_procedures(&[1, 2]);
        assert_eq!(filter.procedures, vec![1, 2]);
        assert!(filter.sites.is_empty());
    }
}
