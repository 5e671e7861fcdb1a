//! Turns config entries into dispatchable callouts

use contracts::{
    CalloutSpec, CustomUrl, MacroAllowlist, MacroTable, MacroValue, RtcConfig, RtcErrorCode,
    UrlEntry, VendorEntry, MAX_CALLOUT_LABEL_LEN,
};
use tracing::{error, warn};
use url::Url;

use crate::macros::{build_allowlist, json_to_macro_value};
use crate::vendors::VendorRegistry;

/// Everything the dispatcher needs for one callout.
#[derive(Debug, Clone)]
pub struct ResolvedCallout {
    /// Label reported in the result
    pub callout: String,
    /// URL template, macros not yet substituted
    pub template: String,
    pub macros: MacroTable,
    pub allowlist: MacroAllowlist,
    pub error_reporting_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Dispatch(ResolvedCallout),
    /// Fails without any network activity
    Rejected {
        callout: String,
        error: RtcErrorCode,
        error_reporting_url: Option<String>,
    },
}

pub struct CalloutResolver<'a> {
    registry: &'a VendorRegistry,
}

impl<'a> CalloutResolver<'a> {
    pub fn new(registry: &'a VendorRegistry) -> Self {
        Self { registry }
    }

    /// Resolve every entry in declaration order: custom URLs, then vendors.
    /// Malformed URL entries are logged and skipped.
    pub fn resolve_all(&self, config: &RtcConfig, custom_macros: &MacroTable) -> Vec<Resolution> {
        for entry in &config.urls {
            if let UrlEntry::Malformed(value) = entry {
                warn!(entry = %value, "Invalid RTC url entry skipped");
            }
        }

        config
            .callouts()
            .map(|spec| self.resolve(spec, custom_macros, config.error_reporting_url.as_deref()))
            .collect()
    }

    pub fn resolve(
        &self,
        spec: CalloutSpec<'_>,
        custom_macros: &MacroTable,
        default_error_reporting_url: Option<&str>,
    ) -> Resolution {
        match spec {
            CalloutSpec::Custom(custom) => Resolution::Dispatch(Self::resolve_custom(
                custom,
                custom_macros,
                default_error_reporting_url,
            )),
            CalloutSpec::Vendor(vendor) => self.resolve_vendor(vendor, custom_macros),
        }
    }

    fn resolve_custom(
        custom: &CustomUrl,
        custom_macros: &MacroTable,
        default_error_reporting_url: Option<&str>,
    ) -> ResolvedCallout {
        ResolvedCallout {
            callout: callout_label(&custom.url),
            template: custom.url.clone(),
            allowlist: build_allowlist(custom_macros),
            macros: custom_macros.clone(),
            error_reporting_url: custom
                .error_reporting_url
                .clone()
                .or_else(|| default_error_reporting_url.map(str::to_owned)),
        }
    }

    fn resolve_vendor(&self, vendor: &VendorEntry, custom_macros: &MacroTable) -> Resolution {
        let Some(definition) = self.registry.lookup(&vendor.name) else {
            return Resolution::Rejected {
                callout: vendor.name.clone(),
                error: RtcErrorCode::UnknownVendor,
                error_reporting_url: None,
            };
        };

        let mut macros = MacroTable::new();
        for (name, value) in &vendor.macros {
            if !definition.accepts_macro(name) {
                error!(vendor = %vendor.name, macro_name = %name, "Unknown macro for vendor, dropped");
                continue;
            }
            // A declared `null` macro still expands, to nothing.
            let value = json_to_macro_value(value).unwrap_or_default();
            macros.insert(name.clone(), MacroValue::Constant(value));
        }
        // Ad network macros take precedence.
        macros.extend(
            custom_macros
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        Resolution::Dispatch(ResolvedCallout {
            callout: vendor.name.to_lowercase(),
            template: definition.url.clone(),
            allowlist: build_allowlist(&macros),
            macros,
            error_reporting_url: definition.error_reporting_url.clone(),
        })
    }
}

/// Host and path of a URL, cut to 50 characters.
pub fn callout_label(url: &str) -> String {
    let label = match Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path()),
        Err(_) => {
            let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
            rest.split(['?', '#']).next().unwrap_or_default().to_string()
        }
    };
    label.chars().take(MAX_CALLOUT_LABEL_LEN).collect()
}
