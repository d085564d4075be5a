//! Prometheus指标
//!
//! 记录检验状态转换和参考区间判定，以文本格式导出。

use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::debug;

/// 转换结果标签
pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_INVALID: &str = "invalid";
pub const OUTCOME_NOT_FOUND: &str = "not_found";
pub const OUTCOME_ERROR: &str = "error";

/// 检验指标
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// 状态转换次数，按转换类型和结果
    exam_transitions_total: IntCounterVec,
    /// 判定次数，按判定类型
    classifications_total: IntCounterVec,
}

impl Metrics {
    /// 创建并注册所有指标
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let exam_transitions_total = IntCounterVec::new(
            Opts::new("lis_exam_transitions_total", "Exam lifecycle operations by transition and outcome"),
            &["transition", "outcome"],
        )?;

        let classifications_total = IntCounterVec::new(
            Opts::new("lis_classifications_total", "Reference band classifications by verdict"),
            &["verdict"],
        )?;

        registry.register(Box::new(exam_transitions_total.clone()))?;
        registry.register(Box::new(classifications_total.clone()))?;

        Ok(Self {
            registry,
            exam_transitions_total,
            classifications_total,
        })
    }

    /// 记录一次生命周期操作（create / conclude / cancel）
    pub fn record_transition(&self, transition: &str, outcome: &str) {
        debug!("Exam transition: {} -> {}", transition, outcome);
        self.exam_transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }

    /// 记录一次判定（within_band / below_minimum / above_maximum / no_verdict）
    pub fn record_classification(&self, verdict: &str) {
        self.classifications_total.with_label_values(&[verdict]).inc();
    }

    pub fn transition_count(&self, transition: &str, outcome: &str) -> u64 {
        self.exam_transitions_total
            .with_label_values(&[transition, outcome])
            .get()
    }

    pub fn classification_count(&self, verdict: &str) -> u64 {
        self.classifications_total.with_label_values(&[verdict]).get()
    }

    /// 以Prometheus文本格式导出
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}
