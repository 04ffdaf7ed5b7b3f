//! Shared error type across reqscope crates.

use thiserror::Error;

use crate::metric::MetricKind;

/// Stable error codes (used in logs and by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidName,
    DuplicateName,
    InvalidType,
    MetricNotFound,
    WrongKind,
    VectorTypeMismatch,
    MissingBuckets,
    InvalidBuckets,
    MissingObjectives,
    InvalidObjective,
    InvalidLabel,
    LabelCardinality,
    NegativeCounterDelta,
    NonFiniteValue,
    CollectorConflict,
    RecorderTask,
    Config,
    Internal,
}

impl ErrorCode {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::DuplicateName => "DUPLICATE_NAME",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::MetricNotFound => "METRIC_NOT_FOUND",
            ErrorCode::WrongKind => "WRONG_KIND",
            ErrorCode::VectorTypeMismatch => "VECTOR_TYPE_MISMATCH",
            ErrorCode::MissingBuckets => "MISSING_BUCKETS",
            ErrorCode::InvalidBuckets => "INVALID_BUCKETS",
            ErrorCode::MissingObjectives => "MISSING_OBJECTIVES",
            ErrorCode::InvalidObjective => "INVALID_OBJECTIVE",
            ErrorCode::InvalidLabel => "INVALID_LABEL",
            ErrorCode::LabelCardinality => "LABEL_CARDINALITY",
            ErrorCode::NegativeCounterDelta => "NEGATIVE_COUNTER_DELTA",
            ErrorCode::NonFiniteValue => "NON_FINITE_VALUE",
            ErrorCode::CollectorConflict => "COLLECTOR_CONFLICT",
            ErrorCode::RecorderTask => "RECORDER_TASK",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type used by core and the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid metric name: {0:?}")]
    InvalidName(String),
    #[error("metric '{0}' already exists")]
    DuplicateName(String),
    #[error("invalid metric type: {0:?}")]
    InvalidType(String),
    #[error("metric '{0}' not found")]
    MetricNotFound(String),
    #[error("metric '{name}' is {actual}, operation requires {expected}")]
    WrongKind {
        name: String,
        actual: MetricKind,
        expected: &'static str,
    },
    #[error("metric '{0}' is bound to a collector of another kind")]
    VectorTypeMismatch(String),
    #[error("metric '{0}' is histogram type, buckets must not be empty")]
    MissingBuckets(String),
    #[error("metric '{0}': buckets must be finite and strictly ascending")]
    InvalidBuckets(String),
    #[error("metric '{0}' is summary type, objectives must not be empty")]
    MissingObjectives(String),
    #[error("metric '{name}': invalid objective {quantile}:{error}")]
    InvalidObjective {
        name: String,
        quantile: f64,
        error: f64,
    },
    #[error("metric '{name}': invalid label name {label:?}")]
    InvalidLabel { name: String, label: String },
    #[error("metric '{name}' expects {expected} label values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("metric '{name}' is a counter and cannot decrease (delta {delta})")]
    NegativeCounterDelta { name: String, delta: f64 },
    #[error("metric '{name}' only records finite values, got {value}")]
    NonFiniteValue { name: String, value: f64 },
    #[error("collector '{0}' is already registered")]
    CollectorConflict(String),
    #[error("recording task aborted: {0}")]
    RecorderTask(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidName(_) => ErrorCode::InvalidName,
            Error::DuplicateName(_) => ErrorCode::DuplicateName,
            Error::InvalidType(_) => ErrorCode::InvalidType,
            Error::MetricNotFound(_) => ErrorCode::MetricNotFound,
            Error::WrongKind { .. } => ErrorCode::WrongKind,
            Error::VectorTypeMismatch(_) => ErrorCode::VectorTypeMismatch,
            Error::MissingBuckets(_) => ErrorCode::MissingBuckets,
            Error::InvalidBuckets(_) => ErrorCode::InvalidBuckets,
            Error::MissingObjectives(_) => ErrorCode::MissingObjectives,
            Error::InvalidObjective { .. } => ErrorCode::InvalidObjective,
            Error::InvalidLabel { .. } => ErrorCode::InvalidLabel,
            Error::LabelCardinality { .. } => ErrorCode::LabelCardinality,
            Error::NegativeCounterDelta { .. } => ErrorCode::NegativeCounterDelta,
            Error::NonFiniteValue { .. } => ErrorCode::NonFiniteValue,
            Error::CollectorConflict(_) => ErrorCode::CollectorConflict,
            Error::RecorderTask(_) => ErrorCode::RecorderTask,
            Error::Config(_) => ErrorCode::Config,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }
}
