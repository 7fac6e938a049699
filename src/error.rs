use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rate limit exceeded: more than {limit} requests in the last 60s")]
    RateLimitExceeded { limit: usize },

    #[error("Cannot connect: {0}")]
    Connectivity(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {status}")]
    Protocol { status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Only construction-time configuration problems stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Configuration(_))
    }

    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Configuration(_) => "configuration",
            BridgeError::RateLimitExceeded { .. } => "rate_limited",
            BridgeError::Connectivity(_) => "connectivity",
            BridgeError::Timeout(_) => "timeout",
            BridgeError::Protocol { .. } => "protocol",
            BridgeError::MalformedResponse(_) => "malformed",
            BridgeError::Validation(_) => "validation",
            BridgeError::Io(_) => "io",
            BridgeError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
