//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LisError;
use crate::input::{NewExam, NewPatient};

/// 检验项目代码
pub mod procedures {
    /// 血糖
    pub const GLUCOSE: i32 = 3027;
    /// 血型鉴定
    pub const BLOOD_TYPING: i32 = 4350;

    /// 报表未指定项目时的默认范围
    pub const DEFAULT_REPORT_PROCEDURES: [i32; 2] = [GLUCOSE, BLOOD_TYPING];
}

/// 患者基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub cpf: String,                    // 11位CPF
    pub name: String,                   // 患者姓名
    pub birth_date: Option<NaiveDate>,  // 出生日期
    pub sex: Option<Sex>,               // 性别
    pub rg: Option<String>,             // 身份证号
    pub rg_uf: Option<String>,          // 发证州
    pub phone: Option<String>,          // 联系电话
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn from_new(new_patient: NewPatient) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            cpf: new_patient.cpf,
            name: new_patient.name,
            birth_date: new_patient.birth_date,
            sex: new_patient.sex,
            rg: new_patient.rg,
            rg_uf: new_patient.rg_uf,
            phone: new_patient.phone,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// 数据库存储代码
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    /// 宽松解析：F / FEMININO / 2 为女性，M / MASCULINO / 1 为男性
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "F" | "FEMININO" | "FEMALE" | "2" => Some(Sex::Female),
            "M" | "MASCULINO" | "MALE" | "1" => Some(Sex::Male),
            _ => None,
        }
    }
}

/// 采集点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSite {
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CollectionSite {
    pub fn new(description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            description,
            created_at: Utc::now(),
        }
    }
}

/// 检验方法学
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamMethod {
    pub id: Uuid,
    pub procedure_id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// 检验项目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub code: i32,
    pub description: String,
}

/// 检验状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExamStatus {
    Pending,   // 待出结果
    Concluded, // 已出结果
    Canceled,  // 已取消
}

impl ExamStatus {
    /// 数据库存储代码
    pub fn code(&self) -> &'static str {
        match self {
            ExamStatus::Pending => "PEND",
            ExamStatus::Concluded => "CONC",
            ExamStatus::Canceled => "CANC",
        }
    }

    /// 终态不再接受任何转换
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExamStatus::Pending)
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamStatus::Pending => "Pending",
            ExamStatus::Concluded => "Concluded",
            ExamStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

impl FromStr for ExamStatus {
    type Err = LisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PEND" => Ok(ExamStatus::Pending),
            "CONC" => Ok(ExamStatus::Concluded),
            "CANC" => Ok(ExamStatus::Canceled),
            other => Err(LisError::Internal(format!("unknown exam status code: {}", other))),
        }
    }
}

/// 检验结果记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: Uuid,
    pub procedure_id: i32,
    pub subject_id: Uuid,                     // 患者ID
    pub collection_site_id: Option<Uuid>,     // 采集点
    pub collected_at: DateTime<Utc>,          // 采集时间
    pub fasting: Option<bool>,                // 是否空腹
    pub pregnant: Option<bool>,               // 是否妊娠
    pub observation: Option<String>,          // 备注
    pub value: Option<String>,                // 结果值（数值或文本）
    pub method_id: Option<Uuid>,              // 方法学
    pub status: ExamStatus,
    pub cancel_reason: Option<String>,        // 取消原因
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExamResult {
    /// 由已校验的创建请求生成待出结果记录
    pub fn pending(new_exam: NewExam) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            procedure_id: new_exam.procedure_id,
            subject_id: new_exam.subject_id,
            collection_site_id: new_exam.collection_site_id,
            collected_at: new_exam.collected_at.unwrap_or(now),
            fasting: new_exam.fasting,
            pregnant: new_exam.pregnant,
            observation: new_exam.observation,
            value: None,
            method_id: None,
            status: ExamStatus::Pending,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 参考区间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBand {
    pub procedure_id: i32,
    pub fasting: bool,
    pub pregnant: bool,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub note: Option<String>,
}

impl ReferenceBand {
    pub fn new(procedure_id: i32, fasting: bool, pregnant: bool, label: &str, min: f64, max: f64) -> Self {
        Self {
            procedure_id,
            fasting,
            pregnant,
            label: label.to_string(),
            min,
            max,
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// 闭区间包含判断
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// 报表行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub exam_id: Uuid,
    pub procedure_id: i32,
    pub procedure_description: Option<String>,
    pub collection_site_id: Option<Uuid>,
    pub collection_site: Option<String>,
    pub value: Option<String>,
    pub status: ExamStatus,
    pub collected_at: DateTime<Utc>,
}
