//! Runtime macros and per-callout allowlists

use contracts::{
    ConsentSnapshot, MacroAllowlist, MacroError, MacroTable, MacroValue, GLOBAL_MACRO_ALLOWLIST,
};
use serde_json::Value;

pub const MACRO_TIMEOUT: &str = "TIMEOUT";
pub const MACRO_CONSENT_STATE: &str = "CONSENT_STATE";
pub const MACRO_CONSENT_STRING: &str = "CONSENT_STRING";
pub const MACRO_CONSENT_METADATA: &str = "CONSENT_METADATA";

/// Add the runtime macros to the ad network's macro table.
///
/// `TIMEOUT` is the batch's effective timeout, which is the budget every callout starts with.
pub fn assign_macros(
    mut macros: MacroTable,
    timeout_millis: u64,
    consent: &ConsentSnapshot,
) -> MacroTable {
    macros.insert(
        MACRO_TIMEOUT.to_string(),
        MacroValue::constant(timeout_millis.to_string()),
    );

    let state = consent.state;
    macros.insert(
        MACRO_CONSENT_STATE.to_string(),
        MacroValue::resolver(move |_| Ok(state.map(|s| s.policy_code().to_string()))),
    );

    let consent_string = consent.string.clone();
    macros.insert(
        MACRO_CONSENT_STRING.to_string(),
        MacroValue::resolver(move |_| Ok(consent_string.clone())),
    );

    let metadata = consent.metadata.clone();
    macros.insert(
        MACRO_CONSENT_METADATA.to_string(),
        MacroValue::resolver(move |key| {
            let key = key.ok_or_else(|| MacroError::missing_key(MACRO_CONSENT_METADATA))?;
            Ok(metadata
                .as_ref()
                .and_then(|m| m.get(key))
                .and_then(json_to_macro_value))
        }),
    );

    macros
}

/// Global allowlist plus every key of the callout's macro table.
pub fn build_allowlist(macros: &MacroTable) -> MacroAllowlist {
    GLOBAL_MACRO_ALLOWLIST
        .iter()
        .map(|name| name.to_string())
        .chain(macros.keys().cloned())
        .collect()
}

/// Objects and arrays are JSON-encoded; `null` has no value.
pub(crate) fn json_to_macro_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
