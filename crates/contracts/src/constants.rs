//! Fixed protocol constants. These must match every other RTC implementation.

/// Maximum number of distinct URLs dispatched per batch
pub const MAX_RTC_CALLOUTS: usize = 5;

/// Substituted URLs longer than this are truncated before dispatch
pub const MAX_URL_LENGTH: usize = 16384;

/// Appended to truncated URLs
pub const TRUNCATION_SUFFIX: &str = "&__trunc__=1";

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 1000;

/// Upper bound of a valid `timeoutMillis`
pub const MAX_TIMEOUT_MILLIS: u64 = 1000;

/// Probability that an error beacon is sent outside dev/test mode
pub const ERROR_SAMPLE_RATE: f64 = 0.01;

/// Callout labels of custom URLs are cut to this many characters
pub const MAX_CALLOUT_LABEL_LEN: usize = 50;

/// Macros every callout may reference regardless of its own macro table
pub const GLOBAL_MACRO_ALLOWLIST: &[&str] = &["CLIENT_ID"];

/// URI prefix of sandboxed-script callouts
pub const SCRIPT_URI_PREFIX: &str = "amp-script:";
