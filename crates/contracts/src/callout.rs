//! Per-callout result types and the closed error taxonomy

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire code reported in `ati` for a successful callout
pub const RTC_SUCCESS_CODE: &str = "2";

/// Closed set of per-callout errors. Never propagated, always carried in a [`CalloutResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtcErrorCode {
    MalformedJsonResponse,
    DuplicateUrl,
    InsecureUrl,
    MaxCalloutsExceeded,
    NetworkFailure,
    UnknownVendor,
    Timeout,
    MacroExpandTimeout,
}

impl RtcErrorCode {
    pub const ALL: [RtcErrorCode; 8] = [
        RtcErrorCode::MalformedJsonResponse,
        RtcErrorCode::DuplicateUrl,
        RtcErrorCode::InsecureUrl,
        RtcErrorCode::MaxCalloutsExceeded,
        RtcErrorCode::NetworkFailure,
        RtcErrorCode::UnknownVendor,
        RtcErrorCode::Timeout,
        RtcErrorCode::MacroExpandTimeout,
    ];

    /// Stable string name
    pub fn as_str(&self) -> &'static str {
        match self {
            RtcErrorCode::MalformedJsonResponse => "MalformedJsonResponse",
            RtcErrorCode::DuplicateUrl => "DuplicateUrl",
            RtcErrorCode::InsecureUrl => "InsecureUrl",
            RtcErrorCode::MaxCalloutsExceeded => "MaxCalloutsExceeded",
            RtcErrorCode::NetworkFailure => "NetworkFailure",
            RtcErrorCode::UnknownVendor => "UnknownVendor",
            RtcErrorCode::Timeout => "Timeout",
            RtcErrorCode::MacroExpandTimeout => "MacroExpandTimeout",
        }
    }

    /// Numeric code used in `ati` and in error beacons (`ERROR_TYPE`)
    pub fn wire_code(&self) -> &'static str {
        match self {
            RtcErrorCode::MalformedJsonResponse => "4",
            RtcErrorCode::DuplicateUrl => "5",
            RtcErrorCode::InsecureUrl => "6",
            RtcErrorCode::MaxCalloutsExceeded => "7",
            RtcErrorCode::NetworkFailure => "8",
            RtcErrorCode::UnknownVendor => "9",
            RtcErrorCode::Timeout => "10",
            RtcErrorCode::MacroExpandTimeout => "11",
        }
    }
}

impl fmt::Display for RtcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one callout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutResult {
    /// Vendor name, or host+path of a custom URL
    pub callout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RtcErrorCode>,
    /// Milliseconds since the batch started
    pub rtc_time: u64,
}

impl CalloutResult {
    pub fn success(callout: impl Into<String>, response: Option<Value>, rtc_time: u64) -> Self {
        Self {
            callout: callout.into(),
            response,
            error: None,
            rtc_time,
        }
    }

    pub fn failure(callout: impl Into<String>, error: RtcErrorCode, rtc_time: u64) -> Self {
        Self {
            callout: callout.into(),
            response: None,
            error: Some(error),
            rtc_time,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `ati` entry for this result
    pub fn status_code(&self) -> &'static str {
        self.error
            .map(|e| e.wire_code())
            .unwrap_or(RTC_SUCCESS_CODE)
    }
}
