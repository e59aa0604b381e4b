/// Encode/decode failure for analytics payloads.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Input is not well-formed JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A required field is absent (or empty, for required strings on encode).
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A recognized traffic-control or criterion key holds the wrong type.
    #[error("type mismatch at {path}: expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    /// A fixed field could not be decoded into its declared type.
    #[error("schema violation: {0}")]
    Schema(String),

    #[error("invalid timestamp at {path}: {value:?}")]
    InvalidTimestamp { path: String, value: String },

    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl PayloadError {
    pub(crate) fn mismatch(path: impl Into<String>, expected: &'static str) -> Self {
        PayloadError::TypeMismatch {
            path: path.into(),
            expected,
        }
    }
}

/// Structured check result for `canary check --json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    pub kind: String,
    pub pass: bool,
    pub errors: Vec<CheckIssue>,
    pub warnings: Vec<CheckIssue>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckIssue {
    pub code: String,
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CheckIssue {
    pub(crate) fn new(code: &str, check: &str, message: impl Into<String>, path: &str) -> Self {
        Self {
            code: code.to_string(),
            check: check.to_string(),
            message: message.into(),
            path: Some(path.to_string()),
        }
    }
}
