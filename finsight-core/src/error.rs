//! Error taxonomy for finsight operations.

use crate::{DocumentType, UploadId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic store errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("embedder initialization failed: {reason}")]
    EmbedderInitFailed { reason: String },

    #[error("store read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("store write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("no documents indexed for upload {upload_id}")]
    UploadNotFound { upload_id: UploadId },
}

/// Session cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no cached insights for document type {document_type} in this session")]
    Missing { document_type: DocumentType },

    #[error("cached insights exist but not for document type {document_type}")]
    DocumentTypeMismatch { document_type: DocumentType },
}

/// LLM client errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("local LLM runtime did not respond within {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("local LLM runtime returned an unparseable payload: {reason}")]
    UnparseablePayload { reason: String },

    #[error("local LLM runtime request failed: {reason}")]
    RequestFailed { reason: String },
}

/// Query Understander / Router errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    #[error("inverted range in filter: {field}")]
    InvertedRange { field: String },

    #[error("classifier output could not be coerced and the keyword fallback also failed")]
    UnroutableQuery,
}

/// Raised while bridging an external parser's output into domain types,
/// before anything reaches the Semantic Store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    #[error("record is missing required field {field}")]
    MissingField { field: String },

    #[error("could not parse {field} as a date: {value}")]
    InvalidDate { field: String, value: String },

    #[error("unrecognized transaction type {value}, expected \"credit\" or \"debit\"")]
    InvalidDirection { value: String },
}

/// Raised when a `SessionId`/`UploadId` fails to parse from a string —
/// folded into this taxonomy rather than hand-rolled, so it carries the
/// same `Display`/`Error` shape as every other component's errors.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to parse {entity_name} id from '{input}': {source}")]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    #[source]
    pub source: IdParseSource,
}

/// Wraps `uuid::Error` so `EntityIdParseError` can derive `PartialEq`
/// (the upstream error type does not implement it).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IdParseSource(pub String);

impl PartialEq for IdParseSource {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl From<uuid::Error> for IdParseSource {
    fn from(err: uuid::Error) -> Self {
        Self(err.to_string())
    }
}

/// Per-agent failure captured during an insights run; does not abort the
/// whole run.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("agent {category} failed: {reason}")]
pub struct AgentFailure {
    pub category: crate::AgentCategory,
    pub reason: String,
}

/// Master error type aggregating every component's errors.
#[derive(Debug, Clone, Error)]
pub enum FinsightError {
    #[error("unauthorized: session context missing or expired")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Agent(#[from] AgentFailure),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Identity(#[from] EntityIdParseError),

    #[error("all agents failed for this run")]
    AllAgentsFailed,
}

pub type FinsightResult<T> = Result<T, FinsightError>;

/// The closed set of error codes surfaced at the ABI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    UploadNotFound,
    CacheMissing,
    DocumentTypeMismatch,
    LlmUnavailable,
    StoreUnavailable,
    InvalidQuery,
    AgentFailure,
}

impl FinsightError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FinsightError::Unauthorized => ErrorCode::Unauthorized,
            FinsightError::Store(StoreError::UploadNotFound { .. }) => ErrorCode::UploadNotFound,
            FinsightError::Store(_) => ErrorCode::StoreUnavailable,
            FinsightError::Cache(CacheError::Missing { .. }) => ErrorCode::CacheMissing,
            FinsightError::Cache(CacheError::DocumentTypeMismatch { .. }) => {
                ErrorCode::DocumentTypeMismatch
            }
            FinsightError::Llm(_) => ErrorCode::LlmUnavailable,
            FinsightError::Router(_) => ErrorCode::InvalidQuery,
            FinsightError::Agent(_) => ErrorCode::AgentFailure,
            FinsightError::Index(_) => ErrorCode::InvalidQuery,
            FinsightError::Identity(_) => ErrorCode::InvalidQuery,
            FinsightError::AllAgentsFailed => ErrorCode::LlmUnavailable,
        }
    }
}

/// The normalized error shape crossing the core's ABI boundary
/// (`{ code, message, details? }`). `thinking` never appears
/// here, in debug builds or otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<&FinsightError> for ApiError {
    fn from(err: &FinsightError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            details: None,
        }
    }
}

impl From<FinsightError> for ApiError {
    fn from(err: FinsightError) -> Self {
        ApiError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_missing_maps_to_cache_missing_code() {
        let err = FinsightError::Cache(CacheError::Missing {
            document_type: DocumentType::Transactions,
        });
        assert_eq!(err.code(), ErrorCode::CacheMissing);
    }

    #[test]
    fn api_error_never_carries_thinking_text() {
        let err = FinsightError::Llm(LlmError::Timeout { timeout_seconds: 30 });
        let api: ApiError = err.into();
        let json = serde_json::to_string(&api).unwrap();
        assert!(!json.contains("thinking"));
    }
}
