use serde::{Deserialize, Serialize};

use crate::classifier::client::GEMINI_API_URL;
use crate::classifier::retry::RetryPolicy;
use crate::transform::transform_model::Context;

/// Recognized engine options. Remote classification is off unless enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub use_remote_classifier: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Custom prompt instruction; `Context.instruction` takes precedence.
    #[serde(default)]
    pub instruction: Option<String>,

    #[serde(default)]
    pub context: Context,

    /// Explicit fingerprint for trees whose text is not a stable identity.
    #[serde(default)]
    pub content_identifier: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// JSONL file receiving one trace event per transformation.
    #[serde(default)]
    pub trace_file: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_remote_classifier: false,
            api_key: None,
            instruction: None,
            context: Context::default(),
            content_identifier: None,
            endpoint: default_endpoint(),
            retry: RetryPolicy::default(),
            trace_file: None,
        }
    }
}

impl EngineConfig {
    pub fn enabled(mut self) -> Self {
        self.use_remote_classifier = true;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_content_identifier(mut self, id: impl Into<String>) -> Self {
        self.content_identifier = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Key presence for logs; the key itself is never printed.
    pub fn api_key_status(&self) -> &'static str {
        if self.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "present"
        } else {
            "missing"
        }
    }
}

fn default_endpoint() -> String {
    GEMINI_API_URL.to_string()
}
