use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    /// Network, DNS or timeout failure before a response arrived
    #[error("transport failure: {0}")]
    Transport(String),

    /// Classifier answered with a non-2xx status
    #[error("classifier returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Response arrived but the generated text was not at the expected path
    #[error("classifier payload has no generated text: {0}")]
    MissingText(String),

    /// Valid JSON that matches neither accepted response shape
    #[error("response does not match the expected shape: {0}")]
    SchemaMismatch(String),

    /// Not valid JSON after code-fence stripping
    #[error("response is not valid JSON: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    /// Retry budget exhausted; wraps the last attempt's failure
    #[error("classification failed after {attempts} attempts: {source}")]
    Classification {
        attempts: u32,
        #[source]
        source: Box<TransformError>,
    },

    /// Remote classification requested while disabled or without credentials
    #[error("classifier misconfigured: {0}")]
    Misconfigured(String),
}

impl TransformError {
    /// Only failures that a fresh request could fix are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransformError::Transport(_)
                | TransformError::HttpStatus { .. }
                | TransformError::MissingText(_)
        )
    }
}

impl From<reqwest::Error> for TransformError {
    fn from(err: reqwest::Error) -> Self {
        TransformError::Transport(err.to_string())
    }
}
