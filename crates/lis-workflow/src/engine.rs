//! 工作流引擎
//!
//! 协调状态机、检验结果存储和参考区间判读的核心引擎

use crate::classification::{self, Classification};
use crate::state_machine::{ExamEvent, ExamStateMachine};
use crate::store::{ExamStore, ReferenceBandLookup};
use chrono::Utc;
use lis_core::input::require_procedure_id;
use lis_core::utils::{normalize_flag, parse_numeric_result};
use lis_core::{
    CancelExamRequest, ConcludeExamRequest, CreateExamRequest, ExamResult, ExamStatus, LisError,
    Result,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 检验详情：记录本身加上判读结果
#[derive(Debug, Clone, Serialize)]
pub struct ExamDetail {
    #[serde(flatten)]
    pub exam: ExamResult,
    #[serde(flatten)]
    pub classification: Classification,
}

/// 检验工作流引擎
///
/// 所有依赖通过构造函数注入，引擎本身不持有可变状态，可在多个请求间共享。
#[derive(Clone)]
pub struct ExamWorkflowEngine {
    state_machine: Arc<ExamStateMachine>,
    exams: Arc<dyn ExamStore>,
    bands: Arc<dyn ReferenceBandLookup>,
}

impl ExamWorkflowEngine {
    /// 创建新的工作流引擎
    pub fn new(exams: Arc<dyn ExamStore>, bands: Arc<dyn ReferenceBandLookup>) -> Self {
        Self {
            state_machine: Arc::new(ExamStateMachine::new()),
            exams,
            bands,
        }
    }

    /// 登记新检验，状态为待出结果
    pub async fn create(&self, request: CreateExamRequest) -> Result<ExamResult> {
        let new_exam = request.validate()?;
        let exam = ExamResult::pending(new_exam);

        self.exams.insert_exam(&exam).await?;

        info!(
            "Exam {} created for subject {} (procedure {})",
            exam.id, exam.subject_id, exam.procedure_id
        );
        Ok(exam)
    }

    /// 录入结果与方法学
    pub async fn conclude(&self, exam_id: Uuid, request: ConcludeExamRequest) -> Result<ExamResult> {
        let conclusion = request.validate()?;
        let current = self.load(exam_id).await?;
        let next = self.next_status(&current, ExamEvent::Conclude)?;

        let mut updated = current.clone();
        updated.value = Some(conclusion.value);
        updated.method_id = Some(conclusion.method_id);
        updated.status = next;
        updated.updated_at = Utc::now();

        self.commit(current.status, updated, ExamEvent::Conclude).await
    }

    /// 取消检验
    pub async fn cancel(&self, exam_id: Uuid, request: CancelExamRequest) -> Result<ExamResult> {
        let reason = request.validate()?;
        let current = self.load(exam_id).await?;
        let next = self.next_status(&current, ExamEvent::Cancel)?;

        let mut updated = current.clone();
        updated.cancel_reason = Some(reason);
        updated.status = next;
        updated.updated_at = Utc::now();

        self.commit(current.status, updated, ExamEvent::Cancel).await
    }

    /// 读取检验记录
    pub async fn get(&self, exam_id: Uuid) -> Result<ExamResult> {
        self.load(exam_id).await
    }

    /// 读取检验记录，已出结果时附带参考区间判读
    pub async fn detail(&self, exam_id: Uuid) -> Result<ExamDetail> {
        let exam = self.load(exam_id).await?;

        let classification = match (&exam.status, &exam.value) {
            (ExamStatus::Concluded, Some(value)) => {
                self.classify(exam.procedure_id, exam.fasting, exam.pregnant, value)
                    .await?
            }
            _ => Classification::empty(),
        };

        Ok(ExamDetail { exam, classification })
    }

    /// 按项目列出检验
    pub async fn list(&self, procedure_id: Option<i32>) -> Result<Vec<ExamResult>> {
        let procedure_id = require_procedure_id(procedure_id)?;
        self.exams.list_exams_by_procedure(procedure_id).await
    }

    /// 参考区间判读
    ///
    /// 标志在此处统一归一化；非数值结果不查询参考区间。只有区间查询本身可能失败。
    pub async fn classify(
        &self,
        procedure_id: i32,
        fasting: Option<bool>,
        pregnant: Option<bool>,
        value: &str,
    ) -> Result<Classification> {
        let fasting = normalize_flag(fasting);
        let pregnant = normalize_flag(pregnant);

        let Some(numeric) = parse_numeric_result(value) else {
            debug!("Result {:?} is not numeric, skipping reference lookup", value);
            return Ok(Classification::empty());
        };

        let bands = self.bands.bands_for(procedure_id, fasting, pregnant).await?;
        debug!(
            "Found {} reference bands for procedure {} (fasting={}, pregnant={})",
            bands.len(),
            procedure_id,
            fasting,
            pregnant
        );

        Ok(classification::classify_numeric(bands, numeric))
    }

    /// 获取状态机实例
    pub fn state_machine(&self) -> &ExamStateMachine {
        &self.state_machine
    }

    async fn load(&self, exam_id: Uuid) -> Result<ExamResult> {
        self.exams
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| LisError::not_found(format!("exam {} not found", exam_id)))
    }

    fn next_status(&self, current: &ExamResult, event: ExamEvent) -> Result<ExamStatus> {
        self.state_machine.transition(current.status, event).map_err(|e| {
            warn!("Rejected {} on exam {} in status {}", event, current.id, current.status);
            e
        })
    }

    /// 以读取时的状态为前提写入；状态已被并发修改时拒绝
    async fn commit(&self, expected: ExamStatus, updated: ExamResult, event: ExamEvent) -> Result<ExamResult> {
        if self.exams.update_if_status(expected, &updated).await? {
            info!("Exam {} status updated from {} to {}", updated.id, expected, updated.status);
            return Ok(updated);
        }

        let actual = self.load(updated.id).await?.status;
        warn!(
            "Lost race on exam {}: expected {} but found {} while applying {}",
            updated.id, expected, actual, event
        );

        Err(LisError::InvalidState {
            from: actual.to_string(),
            event: event.to_string(),
        })
    }
}
