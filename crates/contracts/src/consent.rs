//! Consent state model and provider interface

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enumerated privacy status of the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentState {
    Sufficient,
    Insufficient,
    UnknownNotRequired,
    Unknown,
}

impl ConsentState {
    pub const ALL: [ConsentState; 4] = [
        ConsentState::Sufficient,
        ConsentState::Insufficient,
        ConsentState::UnknownNotRequired,
        ConsentState::Unknown,
    ];

    /// Name used in `sendRegardlessOfConsentState` arrays
    pub fn name(&self) -> &'static str {
        match self {
            ConsentState::Sufficient => "SUFFICIENT",
            ConsentState::Insufficient => "INSUFFICIENT",
            ConsentState::UnknownNotRequired => "UNKNOWN_NOT_REQUIRED",
            ConsentState::Unknown => "UNKNOWN",
        }
    }

    /// Numeric policy code substituted for `CONSENT_STATE`
    pub fn policy_code(&self) -> u8 {
        match self {
            ConsentState::Sufficient => 1,
            ConsentState::Insufficient => 2,
            ConsentState::UnknownNotRequired => 3,
            ConsentState::Unknown => 4,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// States under which no consent filtering happens
    pub fn permits_all(&self) -> bool {
        matches!(
            self,
            ConsentState::Sufficient | ConsentState::UnknownNotRequired
        )
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a `sendRegardlessOfConsentState` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConsentOverride {
    Flag(bool),
    /// Consent state names. Kept as written; unknown names never match.
    States(Vec<String>),
    /// Any other truthy JSON value
    Invalid(Value),
}

impl ConsentOverride {
    /// Interpret a raw JSON field. Absent and falsy values yield `None`.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Null => None,
            Value::Bool(b) => Some(ConsentOverride::Flag(*b)),
            Value::Array(items) => Some(ConsentOverride::States(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(ConsentOverride::Invalid(other.clone())),
        }
    }
}

/// Supplies consent data at call time.
pub trait ConsentProvider {
    fn consent_state(&self) -> Option<ConsentState>;
    fn consent_string(&self) -> Option<String>;
    fn consent_metadata(&self) -> Option<Map<String, Value>>;
}

/// Consent data captured once per batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsentSnapshot {
    pub state: Option<ConsentState>,
    pub string: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl ConsentSnapshot {
    pub fn capture<P: ConsentProvider + ?Sized>(provider: &P) -> Self {
        Self {
            state: provider.consent_state(),
            string: provider.consent_string(),
            metadata: provider.consent_metadata(),
        }
    }

    pub fn with_state(state: ConsentState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

impl ConsentProvider for ConsentSnapshot {
    fn consent_state(&self) -> Option<ConsentState> {
        self.state
    }

    fn consent_string(&self) -> Option<String> {
        self.string.clone()
    }

    fn consent_metadata(&self) -> Option<Map<String, Value>> {
        self.metadata.clone()
    }
}
