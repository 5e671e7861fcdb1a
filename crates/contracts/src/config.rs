//! Normalized RTC configuration

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{ConsentOverride, DEFAULT_TIMEOUT_MILLIS};

/// Validated configuration of one RTC batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfig {
    pub urls: Vec<UrlEntry>,
    /// Declaration order of the source document
    pub vendors: Vec<VendorEntry>,
    pub timeout_millis: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reporting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_regardless_of_consent_state: Option<ConsentOverride>,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            vendors: Vec::new(),
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            error_reporting_url: None,
            send_regardless_of_consent_state: None,
        }
    }
}

impl RtcConfig {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.vendors.is_empty()
    }

    /// Dispatchable entries in declaration order: custom URLs first, then vendors.
    /// Malformed URL entries are not included.
    pub fn callouts(&self) -> impl Iterator<Item = CalloutSpec<'_>> {
        self.urls
            .iter()
            .filter_map(|entry| match entry {
                UrlEntry::Custom(custom) => Some(CalloutSpec::Custom(custom)),
                UrlEntry::Malformed(_) => None,
            })
            .chain(self.vendors.iter().map(CalloutSpec::Vendor))
    }
}

/// One element of the `urls` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UrlEntry {
    Custom(CustomUrl),
    /// Neither a string nor an object with a string `url`
    Malformed(Value),
}

impl UrlEntry {
    pub fn consent_override(&self) -> Option<&ConsentOverride> {
        match self {
            UrlEntry::Custom(custom) => custom.send_regardless_of_consent_state.as_ref(),
            UrlEntry::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomUrl {
    /// URL template, macros not yet substituted
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reporting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_regardless_of_consent_state: Option<ConsentOverride>,
}

impl CustomUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error_reporting_url: None,
            send_regardless_of_consent_state: None,
        }
    }
}

/// One entry of the `vendors` object, flat and nested shapes alike.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorEntry {
    /// Vendor name as written by the publisher
    pub name: String,
    pub macros: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_regardless_of_consent_state: Option<ConsentOverride>,
}

/// A single dispatchable entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalloutSpec<'a> {
    Custom(&'a CustomUrl),
    Vendor(&'a VendorEntry),
}
