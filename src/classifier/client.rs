use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::classifier::prompt::build_prompt;
use crate::classifier::retry::{Attempted, RetryPolicy, retry_with_backoff};
use crate::transform::error::TransformError;
use crate::transform::normalize::normalize_for_target;
use crate::transform::transform_model::{Context, TransformationMap};

pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

// ============================================================================
// TextGeneration — transport seam
// ============================================================================

/// One round trip to a text-generation endpoint: prompt in, generated text out.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, TransformError>;
}

// ============================================================================
// Gemini backend
// ============================================================================

pub struct GeminiBackend {
    client: HttpClient,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiBackend {
    pub fn with_timeout(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, TransformError> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGeneration for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, TransformError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransformError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| TransformError::MissingText(format!("undecodable payload: {}", e)))?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| TransformError::MissingText("candidates[0].content.parts[0].text".into()))
    }
}

// ============================================================================
// ClassifierClient — prompt, retry, normalize
// ============================================================================

pub struct ClassifierClient {
    backend: Option<Arc<dyn TextGeneration>>,
    enabled: bool,
    policy: RetryPolicy,
}

impl ClassifierClient {
    pub fn new(backend: Arc<dyn TextGeneration>, policy: RetryPolicy) -> Self {
        Self {
            backend: Some(backend),
            enabled: true,
            policy,
        }
    }

    /// A client that refuses every request with `Misconfigured`.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            enabled: false,
            policy: RetryPolicy::default(),
        }
    }

    /// Enabled but without a transport, e.g. no API key configured.
    pub fn without_backend(policy: RetryPolicy) -> Self {
        Self {
            backend: None,
            enabled: true,
            policy,
        }
    }

    /// Classify `content` under `context` and return the raw generated text.
    ///
    /// Transport failures, non-2xx statuses and payloads without generated
    /// text are retried per the policy; the last failure is wrapped in
    /// `Classification`.
    pub async fn classify_raw(
        &self,
        instruction: &str,
        content: &str,
        context: &Context,
    ) -> Result<String, TransformError> {
        let backend = self.backend()?;
        let prompt = build_prompt(instruction, content, context);
        debug!(prompt_len = prompt.len(), "sending classification prompt");

        let result = retry_with_backoff(&self.policy, TransformError::is_retryable, |attempt| {
            let backend = Arc::clone(backend);
            let prompt = &prompt;
            async move {
                debug!(attempt, "classifier request");
                backend.generate(prompt).await
            }
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(Attempted { attempts, error }) if error.is_retryable() => {
                error!("Classification failed after {} attempts: {}", attempts, error);
                Err(TransformError::Classification {
                    attempts,
                    source: Box::new(error),
                })
            }
            Err(Attempted { error, .. }) => Err(error),
        }
    }

    /// Classify and normalize. Parse failures are returned as-is, never retried.
    pub async fn classify(
        &self,
        instruction: &str,
        content: &str,
        context: &Context,
        implicit_target: &str,
    ) -> Result<TransformationMap, TransformError> {
        let raw = self.classify_raw(instruction, content, context).await?;
        let map = normalize_for_target(&raw, implicit_target)?;
        info!(entries = map.len(), "classification normalized");
        Ok(map)
    }

    fn backend(&self) -> Result<&Arc<dyn TextGeneration>, TransformError> {
        if !self.enabled {
            return Err(TransformError::Misconfigured(
                "remote classification is disabled".to_string(),
            ));
        }
        self.backend
            .as_ref()
            .ok_or_else(|| TransformError::Misconfigured("no API key configured".to_string()))
    }
}
