use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("missing required parameter(s): {}", .0.join(", "))]
    MissingRequiredParameter(Vec<String>),
    #[error("mode flags are mutually exclusive, got: {}", .0.join(", "))]
    ConflictingModes(Vec<&'static str>),
    #[error("{profile} service {index}: missing field {field}")]
    MissingField {
        profile: String,
        index: usize,
        field: String,
    },
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
    #[error("bad duration {0:?}: expected HH:MM:SS, '0' or 'endless'")]
    DurationFormat(String),
    #[error("{operation} failed: code={code} message={message}")]
    RemoteApply {
        operation: String,
        code: i64,
        message: String,
    },
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("verification mismatch at {field}: expected {expected}, read back {actual}")]
    VerificationMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("export failed: {0}")]
    Export(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(key: &str, value: &str, reason: &'static str) -> Self {
        Error::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}
