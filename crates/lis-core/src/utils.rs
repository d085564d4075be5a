//! 通用工具函数

use serde::{de, Deserialize, Deserializer};

/// 将可选标志统一归一化为布尔值，缺省视为 `false`
pub fn normalize_flag(flag: Option<bool>) -> bool {
    flag.unwrap_or(false)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagInput {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// 反序列化可选标志：接受 `true/false`、`0/1`、`"true"/"false"/"0"/"1"` 与 `null`
pub fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<FlagInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FlagInput::Bool(b)) => Ok(Some(b)),
        Some(FlagInput::Int(0)) => Ok(Some(false)),
        Some(FlagInput::Int(1)) => Ok(Some(true)),
        Some(FlagInput::Int(n)) => Err(de::Error::custom(format!("invalid flag value: {}", n))),
        Some(FlagInput::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(de::Error::custom(format!("invalid flag value: {}", other))),
        },
    }
}

/// 去除首尾空白，空串视为缺失
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// CPF必须恰好是11位数字
pub fn is_valid_cpf(cpf: &str) -> bool {
    cpf.len() == 11 && cpf.bytes().all(|b| b.is_ascii_digit())
}

/// 解析检验结果中的数值
///
/// 取字符串开头的最长数值前缀（如 `"85 mg/dL"` 得到 85），仅含逗号时把逗号当作小数点。
/// 无数值前缀或结果非有限数时返回 `None`，例如血型 `"A+"`。
pub fn parse_numeric_result(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replacen(',', ".", 1)
    } else {
        trimmed.to_string()
    };

    let bytes = normalized.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if !normalized[digits_start..end].bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    // 指数部分只有在后面跟着数字时才计入
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    normalized[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flag() {
        assert!(!normalize_flag(None));
        assert!(!normalize_flag(Some(false)));
        assert!(normalize_flag(Some(true)));
    }

    #[test]
    fn test_is_valid_cpf() {
        assert!(is_valid_cpf("12345678901"));
        assert!(!is_valid_cpf("1234567890"));
        assert!(!is_valid_cpf("123.456.789-01"));
        assert!(!is_valid_cpf(""));
    }

    #[test]
    fn test_parse_numeric_result() {
        assert_eq!(parse_numeric_result("85"), Some(85.0));
        assert_eq!(parse_numeric_result(" 85.5 "), Some(85.5));
        assert_eq!(parse_numeric_result("85,5"), Some(85.5));
        assert_eq!(parse_numeric_result("110 mg/dL"), Some(110.0));
        assert_eq!(parse_numeric_result("-3"), Some(-3.0));
        assert_eq!(parse_numeric_result(".5"), Some(0.5));
        assert_eq!(parse_numeric_result("1e2"), Some(100.0));
        assert_eq!(parse_numeric_result("12e"), Some(12.0));
    }

    #[test]
    fn test_parse_non_numeric_result() {
        assert_eq!(parse_numeric_result("A+"), None);
        assert_eq!(parse_numeric_result("O-"), None);
        assert_eq!(parse_numeric_result(""), None);
        assert_eq!(parse_numeric_result("NaN"), None);
        assert_eq!(parse_numeric_result("inf"), None);
        assert_eq!(parse_numeric_result("-"), None);
        assert_eq!(parse_numeric_result("."), None);
    }
}
