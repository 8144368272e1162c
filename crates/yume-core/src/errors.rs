//! Error types for Yume

use thiserror::Error;

/// Core errors that can occur in Yume
#[derive(Debug, Error)]
pub enum Error {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Fullnode connection and query errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Fullnode unreachable at {url}")]
    Unreachable { url: String },

    #[error("Fullnode returned error: {message}")]
    ApiError { message: String },

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Market not configured: {market_id}")]
    MarketNotConfigured { market_id: String },

    #[error("Protocol state unavailable: {reason}")]
    StateUnavailable { reason: String },

    /// Well-formed request the protocol refuses, e.g. matching one's own order
    #[error("Action not allowed: {reason}")]
    ActionNotAllowed { reason: String },

    /// A single record in a bulk traversal could not be parsed. Readers log
    /// and skip it; it never fails the enclosing fetch.
    #[error("Failed to parse record {object_id}: {message}")]
    RecordParse { object_id: String, message: String },
}

/// Transaction building and submission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not authorized: no signing account connected")]
    NotAuthorized,

    #[error("A submission is already pending")]
    AlreadyPending,

    #[error("Failed to serialize transaction: {message}")]
    SerializationFailed { message: String },

    #[error("Transaction submission failed: {message}")]
    SubmissionFailed { message: String },
}

/// Result type alias for Yume operations
pub type Result<T> = std::result::Result<T, Error>;

impl ProtocolError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MarketNotConfigured { .. } => "market_not_configured",
            Self::StateUnavailable { .. } => "state_unavailable",
            Self::ActionNotAllowed { .. } => "action_not_allowed",
            Self::RecordParse { .. } => "record_parse_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MarketNotConfigured { .. } => 404,
            Self::ActionNotAllowed { .. } => 422,
            Self::StateUnavailable { .. } | Self::RecordParse { .. } => 503,
        }
    }
}

impl TxError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotAuthorized => "not_authorized",
            Self::AlreadyPending => "already_pending",
            Self::SerializationFailed { .. } => "serialization_failed",
            Self::SubmissionFailed { .. } => "submission_failed",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::NotAuthorized => 401,
            Self::AlreadyPending => 409,
            Self::SerializationFailed { .. } => 500,
            Self::SubmissionFailed { .. } => 502,
        }
    }
}

impl From<RpcError> for ProtocolError {
    fn from(err: RpcError) -> Self {
        Self::StateUnavailable {
            reason: err.to_string(),
        }
    }
}
