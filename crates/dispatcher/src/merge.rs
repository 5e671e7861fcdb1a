//! Folding RTC results into ad request targeting

use contracts::CalloutResult;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::vendors::VendorRegistry;

/// Maximum nesting depth followed by [`deep_merge`]
pub const MAX_MERGE_DEPTH: usize = 10;

const KEY_TARGETING: &str = "targeting";
const KEY_CATEGORY_EXCLUSIONS: &str = "categoryExclusions";

/// Ad request parameters describing the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtcParams {
    /// `rtcTime` of each result
    pub artc: Option<String>,
    /// Wire code of each result, `2` for success
    pub ati: String,
    /// Callout label of each result
    pub ard: String,
}

/// Merge successful responses into `targeting` and summarize the batch.
///
/// `targeting["targeting"]` receives each response's `targeting` object and
/// `targeting["categoryExclusions"]` the union of all exclusions.
/// Returns `None` when the batch was aborted.
pub fn merge_rtc_responses(
    results: Option<&[CalloutResult]>,
    targeting: &mut Map<String, Value>,
    registry: &VendorRegistry,
) -> Option<RtcParams> {
    let results = results?;

    let mut artc = Vec::with_capacity(results.len());
    let mut ati = Vec::with_capacity(results.len());
    let mut ard = Vec::with_capacity(results.len());
    let mut exclusions: Option<Vec<Value>> = None;

    for result in results {
        artc.push(result.rtc_time.to_string());
        ati.push(result.status_code());
        ard.push(result.callout.as_str());

        let Some(Value::Object(response)) = &result.response else {
            continue;
        };

        if let Some(Value::Object(incoming)) = response.get(KEY_TARGETING) {
            let rewritten = rewrite_keys(incoming, &result.callout, registry);
            match targeting.get_mut(KEY_TARGETING) {
                Some(Value::Object(existing)) => deep_merge(existing, rewritten, 0),
                _ => {
                    targeting.insert(KEY_TARGETING.to_string(), Value::Object(rewritten));
                }
            }
        }

        if let Some(Value::Array(incoming)) = response.get(KEY_CATEGORY_EXCLUSIONS) {
            let merged = exclusions.get_or_insert_with(|| match targeting.get(KEY_CATEGORY_EXCLUSIONS) {
                Some(Value::Array(existing)) => dedup(existing.iter()),
                _ => Vec::new(),
            });
            for exclusion in incoming {
                if !merged.contains(exclusion) {
                    merged.push(exclusion.clone());
                }
            }
        }
    }

    if let Some(exclusions) = exclusions {
        targeting.insert(KEY_CATEGORY_EXCLUSIONS.to_string(), Value::Array(exclusions));
    }

    Some(RtcParams {
        artc: (!artc.is_empty()).then(|| artc.join(",")),
        ati: ati.join(","),
        ard: ard.join(","),
    })
}

fn dedup<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

/// Vendor responses get their keys suffixed with `_<vendor>` unless the
/// vendor opts out. Custom URL responses are kept as is.
fn rewrite_keys(
    response: &Map<String, Value>,
    callout: &str,
    registry: &VendorRegistry,
) -> Map<String, Value> {
    match registry.lookup(callout) {
        Some(vendor) if !vendor.disable_key_append => response
            .iter()
            .map(|(key, value)| (format!("{key}_{callout}"), value.clone()))
            .collect(),
        _ => response.clone(),
    }
}

/// Merge `source` into `target`. Nested objects merge recursively up to
/// [`MAX_MERGE_DEPTH`]; anything else overwrites.
pub fn deep_merge(target: &mut Map<String, Value>, source: Map<String, Value>, depth: usize) {
    for (key, value) in source {
        match value {
            Value::Object(incoming) if depth < MAX_MERGE_DEPTH => match target.get_mut(&key) {
                Some(Value::Object(existing)) => deep_merge(existing, incoming, depth + 1),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}
