//! 配置校验模块
//!
//! 校验规则：
//! - `vendors` 或 `urls` 至少存在一个 (truthy)
//! - `vendors` 必须是对象，`urls` 必须是数组
//! - `timeoutMillis` 按整数解析，NaN 或超出 [0, 1000] 时回退到默认值 (仅警告)
//! - 非安全的 `errorReportingUrl` 被清除 (仅警告)
//! - 未知顶层字段仅警告
//!
//! 致命错误返回 `ContractError`，调用方据此放弃整个 RTC 批次。

use contracts::{
    ConsentOverride, ContractError, CustomUrl, RtcConfig, UrlEntry, UrlValidator, VendorEntry,
    DEFAULT_TIMEOUT_MILLIS, MAX_TIMEOUT_MILLIS,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::parser::{is_truthy, type_name};

pub(crate) const KEY_VENDORS: &str = "vendors";
pub(crate) const KEY_URLS: &str = "urls";
pub(crate) const KEY_TIMEOUT: &str = "timeoutMillis";
pub(crate) const KEY_ERROR_REPORTING_URL: &str = "errorReportingUrl";
pub(crate) const KEY_CONSENT_OVERRIDE: &str = "sendRegardlessOfConsentState";

/// 校验并规范化解析后的配置
///
/// 返回第一个遇到的致命错误，或规范化后的 `RtcConfig`。
pub fn validate<V>(raw: &Map<String, Value>, url_validator: &V) -> Result<RtcConfig, ContractError>
where
    V: UrlValidator + ?Sized,
{
    let has_vendors = raw.get(KEY_VENDORS).is_some_and(is_truthy);
    let has_urls = raw.get(KEY_URLS).is_some_and(is_truthy);
    if !has_vendors && !has_urls {
        return Err(ContractError::config_validation(
            "vendors/urls",
            "RTC config must specify vendors or urls",
        ));
    }

    let mut config = RtcConfig::default();

    for (key, value) in raw {
        match key.as_str() {
            KEY_VENDORS => config.vendors = validate_vendors(value)?,
            KEY_URLS => config.urls = validate_urls(value, url_validator)?,
            KEY_TIMEOUT => config.timeout_millis = validate_timeout(value),
            KEY_ERROR_REPORTING_URL => {
                config.error_reporting_url =
                    secure_error_reporting_url(Some(value), url_validator);
            }
            KEY_CONSENT_OVERRIDE => {
                config.send_regardless_of_consent_state = ConsentOverride::from_value(Some(value));
            }
            unknown => warn!(key = unknown, "Unknown RTC config key ignored"),
        }
    }

    if config.is_empty() {
        return Err(ContractError::config_validation(
            "vendors/urls",
            "RTC config declares no callouts",
        ));
    }

    Ok(config)
}

/// 校验 vendors：必须是对象，保持声明顺序
fn validate_vendors(value: &Value) -> Result<Vec<VendorEntry>, ContractError> {
    let Value::Object(vendors) = value else {
        return Err(ContractError::config_validation(
            KEY_VENDORS,
            format!("RTC invalid vendors: expected object, got {}", type_name(value)),
        ));
    };

    Ok(vendors
        .iter()
        .map(|(name, spec)| normalize_vendor(name, spec))
        .collect())
}

/// 扁平格式 `{MACRO: value}` 与旧版嵌套格式 `{macros: {...}}` 统一为 `VendorEntry`
fn normalize_vendor(name: &str, spec: &Value) -> VendorEntry {
    let Value::Object(obj) = spec else {
        if is_truthy(spec) {
            warn!(vendor = name, "RTC vendor spec is not an object, using no macros");
        }
        return VendorEntry {
            name: name.to_string(),
            macros: Map::new(),
            send_regardless_of_consent_state: None,
        };
    };

    let macros = match obj.get("macros") {
        Some(Value::Object(nested)) => nested.clone(),
        _ => obj
            .iter()
            .filter(|(key, _)| key.as_str() != KEY_CONSENT_OVERRIDE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };

    VendorEntry {
        name: name.to_string(),
        macros,
        send_regardless_of_consent_state: ConsentOverride::from_value(obj.get(KEY_CONSENT_OVERRIDE)),
    }
}

/// 校验 urls：必须是数组
fn validate_urls<V>(value: &Value, url_validator: &V) -> Result<Vec<UrlEntry>, ContractError>
where
    V: UrlValidator + ?Sized,
{
    let Value::Array(urls) = value else {
        return Err(ContractError::config_validation(
            KEY_URLS,
            format!("RTC invalid urls: expected array, got {}", type_name(value)),
        ));
    };

    Ok(urls
        .iter()
        .map(|entry| normalize_url_entry(entry, url_validator))
        .collect())
}

fn normalize_url_entry<V>(entry: &Value, url_validator: &V) -> UrlEntry
where
    V: UrlValidator + ?Sized,
{
    match entry {
        Value::String(url) => UrlEntry::Custom(CustomUrl::new(url.clone())),
        Value::Object(obj) => match obj.get("url") {
            Some(Value::String(url)) => UrlEntry::Custom(CustomUrl {
                url: url.clone(),
                error_reporting_url: secure_error_reporting_url(
                    obj.get(KEY_ERROR_REPORTING_URL),
                    url_validator,
                ),
                send_regardless_of_consent_state: ConsentOverride::from_value(
                    obj.get(KEY_CONSENT_OVERRIDE),
                ),
            }),
            _ => UrlEntry::Malformed(entry.clone()),
        },
        other => UrlEntry::Malformed(other.clone()),
    }
}

/// 按 `parseInt` 语义解析超时，非法时回退到默认值
fn validate_timeout(value: &Value) -> u64 {
    match parse_int_like(value) {
        None => {
            warn!(
                value = %value,
                default_ms = DEFAULT_TIMEOUT_MILLIS,
                "Invalid RTC timeout is NaN, using default timeout"
            );
            DEFAULT_TIMEOUT_MILLIS
        }
        Some(timeout) if timeout < 0 || timeout > MAX_TIMEOUT_MILLIS as i64 => {
            warn!(
                timeout_ms = timeout,
                default_ms = DEFAULT_TIMEOUT_MILLIS,
                "Invalid RTC timeout, using default timeout"
            );
            DEFAULT_TIMEOUT_MILLIS
        }
        Some(timeout) => timeout as u64,
    }
}

/// 数字截断取整；字符串取前导整数部分 (`"500ms"` -> 500)；
/// 数组按首元素解析 (`[500]` -> 500)
fn parse_int_like(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_int_prefix(s),
        Value::Array(items) => items.first().and_then(parse_int_like),
        _ => None,
    }
}

fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // Anything that overflows i64 is far out of range anyway.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn secure_error_reporting_url<V>(value: Option<&Value>, url_validator: &V) -> Option<String>
where
    V: UrlValidator + ?Sized,
{
    match value? {
        Value::String(url) if url.is_empty() => None,
        Value::String(url) if url_validator.is_secure(url) => Some(url.clone()),
        Value::String(url) => {
            warn!(url = %url, "Insecure RTC errorReportingUrl cleared");
            None
        }
        other if is_truthy(other) => {
            warn!(value = %other, "RTC errorReportingUrl must be a string, ignored");
            None
        }
        _ => None,
    }
}
