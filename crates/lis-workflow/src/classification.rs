//! 参考区间判读
//!
//! 将已出结果的数值与参考区间比较，得到给人阅读的判读结论。判读是纯函数，
//! 所有输入都有确定的回退结果，不会返回错误。

use lis_core::utils::parse_numeric_result;
use lis_core::ReferenceBand;
use serde::Serialize;

/// 低于所有参考区间
pub const BELOW_MINIMUM: &str = "below minimum reference";
/// 落在参考区间之间的空隙或高于所有区间
pub const ABOVE_MAXIMUM: &str = "above maximum reference";

/// 判读结论类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictKind {
    WithinBand,
    BelowMinimum,
    AboveMaximum,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::WithinBand => "within_band",
            VerdictKind::BelowMinimum => "below_minimum",
            VerdictKind::AboveMaximum => "above_maximum",
        }
    }
}

/// 判读结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// 该项目在当前空腹/妊娠条件下的全部参考区间（按下限升序）
    pub bands: Vec<ReferenceBand>,
    pub verdict: Option<String>,
    #[serde(skip)]
    pub kind: Option<VerdictKind>,
}

impl Classification {
    /// 无参考区间、无结论
    pub fn empty() -> Self {
        Self {
            bands: Vec::new(),
            verdict: None,
            kind: None,
        }
    }
}

/// 落在区间内时生成的默认结论
pub fn within_band_message(label: &str) -> String {
    format!("within reference band \"{}\"", label)
}

/// 按下限升序排列，下限相同的区间保持存储顺序
pub fn sort_bands(bands: &mut [ReferenceBand]) {
    bands.sort_by(|a, b| a.min.total_cmp(&b.min));
}

/// 对文本形式的结果值进行判读
///
/// `bands` 应为同一 (项目, 空腹, 妊娠) 键下的全部区间。
pub fn classify(bands: Vec<ReferenceBand>, value: &str) -> Classification {
    match parse_numeric_result(value) {
        Some(numeric) => classify_numeric(bands, numeric),
        None => Classification::empty(),
    }
}

/// 对数值结果进行判读
pub fn classify_numeric(mut bands: Vec<ReferenceBand>, value: f64) -> Classification {
    if bands.is_empty() {
        return Classification::empty();
    }
    sort_bands(&mut bands);

    let (verdict, kind) = match bands.iter().find(|band| band.contains(value)) {
        Some(band) => {
            let message = band
                .note
                .as_deref()
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| within_band_message(&band.label));
            (message, VerdictKind::WithinBand)
        }
        None if value < bands[0].min => (BELOW_MINIMUM.to_string(), VerdictKind::BelowMinimum),
        None => (ABOVE_MAXIMUM.to_string(), VerdictKind::AboveMaximum),
    };

    Classification {
        bands,
        verdict: Some(verdict),
        kind: Some(kind),
    }
}
