//! Outcome normalization and sampled error beacons

use config_loader::is_truthy;
use contracts::{
    CalloutResult, HttpClient, MacroAllowlist, MacroTable, MacroValue, RtcErrorCode,
    TransportError, VariableResolver, ERROR_SAMPLE_RATE,
};
use serde_json::Value;
use tracing::{debug, warn};

/// The only macros an error reporting URL may use
pub const MACRO_ERROR_TYPE: &str = "ERROR_TYPE";
pub const MACRO_HREF: &str = "HREF";

/// Error beacon settings
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Substituted for `HREF`
    pub page_href: String,
    /// Probability of sending a beacon per error
    pub sample_rate: f64,
    /// Dev/test mode: send every beacon
    pub always_report: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            page_href: String::new(),
            sample_rate: ERROR_SAMPLE_RATE,
            always_report: false,
        }
    }
}

/// Builds error results and fires their beacons.
pub struct ErrorReporter<'a, V, H> {
    resolver: &'a V,
    http: &'a H,
    config: &'a ReporterConfig,
}

impl<'a, V, H> ErrorReporter<'a, V, H>
where
    V: VariableResolver,
    H: HttpClient,
{
    pub fn new(resolver: &'a V, http: &'a H, config: &'a ReporterConfig) -> Self {
        Self {
            resolver,
            http,
            config,
        }
    }

    /// Error result for `callout`. Beacon failures never affect it.
    pub fn report(
        &self,
        error: RtcErrorCode,
        callout: &str,
        error_reporting_url: Option<&str>,
        rtc_time: u64,
    ) -> CalloutResult {
        warn!(callout = %callout, error = %error, rtc_time_ms = rtc_time, "RTC callout failed");

        if let Some(url) = error_reporting_url.filter(|url| !url.is_empty()) {
            self.send_error_message(error, url);
        }

        CalloutResult::failure(callout, error, rtc_time)
    }

    fn should_send(&self) -> bool {
        self.config.always_report || rand::random::<f64>() < self.config.sample_rate
    }

    fn send_error_message(&self, error: RtcErrorCode, error_reporting_url: &str) {
        if !self.should_send() {
            return;
        }

        let mut macros = MacroTable::new();
        macros.insert(MACRO_ERROR_TYPE.to_string(), MacroValue::constant(error.wire_code()));
        macros.insert(
            MACRO_HREF.to_string(),
            MacroValue::constant(self.config.page_href.clone()),
        );
        let allowlist: MacroAllowlist = [MACRO_ERROR_TYPE, MACRO_HREF]
            .into_iter()
            .map(str::to_owned)
            .collect();

        let url = self
            .resolver
            .expand_sync(error_reporting_url, &macros, &allowlist);
        debug!(url = %url, error = %error, "Sending RTC error beacon");
        self.http.send_beacon(&url);
        observability::record_error_beacon();
    }
}

/// Body of an HTTP callout. An empty body is a success without response;
/// a body that parses to a falsy value (`null`, `false`, `0`, `""`) is malformed.
pub fn normalize_body(text: &str) -> Result<Option<Value>, RtcErrorCode> {
    if text.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) if is_truthy(&value) => Ok(Some(value)),
        _ => Err(RtcErrorCode::MalformedJsonResponse),
    }
}

/// Value produced by a sandboxed script. Must be an object, array or null.
pub fn normalize_script(value: Value) -> Result<Option<Value>, RtcErrorCode> {
    match value {
        Value::Null => Ok(None),
        value @ (Value::Object(_) | Value::Array(_)) => Ok(Some(value)),
        _ => Err(RtcErrorCode::MalformedJsonResponse),
    }
}

/// `None` for cancellations, which produce no result.
pub fn classify_transport_error(error: &TransportError) -> Option<RtcErrorCode> {
    if error.is_cancellation() {
        None
    } else if error.is_timeout() {
        Some(RtcErrorCode::Timeout)
    } else {
        Some(RtcErrorCode::NetworkFailure)
    }
}
