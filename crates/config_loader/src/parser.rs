//! 配置解析模块
//!
//! RTC 配置是单个 JSON 字符串，顶层必须是对象。

use contracts::ContractError;
use serde_json::{Map, Value};

/// 解析原始 JSON 配置
///
/// 空字符串、JSON 语法错误、以及 falsy / 非对象的顶层值都会失败。
pub fn parse(content: &str) -> Result<Map<String, Value>, ContractError> {
    if content.trim().is_empty() {
        return Err(ContractError::config_parse("rtc-config is empty"));
    }

    let value: Value = serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("JSON parse error: {e}"), e))?;

    match value {
        Value::Object(map) => Ok(map),
        other if !is_truthy(&other) => Err(ContractError::config_parse(
            "rtc-config must not be a falsy value",
        )),
        other => Err(ContractError::config_parse(format!(
            "rtc-config must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
