use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a single `transform` call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOutcome {
    Disabled,
    CacheHit,
    Classified,
    Shared,
    Fallback,
}

#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub fingerprint: Option<String>,

    pub outcome: TransformOutcome,

    pub patched_keys: Vec<String>,
    pub error: Option<String>,
}

impl TraceEvent {
    pub fn now(outcome: TransformOutcome) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            fingerprint: None,
            outcome,
            patched_keys: vec![],
            error: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl ToString) -> Self {
        self.fingerprint = Some(fingerprint.to_string());
        self
    }

    pub fn with_keys<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.patched_keys = keys.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}
