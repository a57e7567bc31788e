//! Classified error taxonomy for the translation engine.
//!
//! Mirrors the shape of the host crate's `translation::error` module:
//! every variant carries a human message plus `severity()`, `category()`
//! and `is_retryable()` so callers can decide whether to log-and-contain
//! or propagate without matching on the variant itself.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("no translatable content found in the document")]
    EmptyDocument,

    #[error("batch {batch_index} failed to translate: {message}")]
    BatchTranslationFailed { batch_index: usize, message: String },

    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),

    #[error("structured output unavailable: {0}")]
    StructuredOutputUnavailable(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("cancellation error: {0}")]
    CancellationError(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// How urgently an error deserves human attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// What subsystem an error originates from, for aggregate statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Document,
    Batch,
    Llm,
    Storage,
    Serialization,
    Config,
    Cache,
    Cancellation,
    Internal,
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::LlmCallFailed(_) | EngineError::StorageError(_) | EngineError::CacheError(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::EmptyDocument => ErrorSeverity::Error,
            EngineError::BatchTranslationFailed { .. } => ErrorSeverity::Error,
            EngineError::LlmCallFailed(_) => ErrorSeverity::Warning,
            EngineError::StructuredOutputUnavailable(_) => ErrorSeverity::Warning,
            EngineError::StorageError(_) => ErrorSeverity::Warning,
            EngineError::SerializationError(_) => ErrorSeverity::Warning,
            EngineError::ConfigError(_) => ErrorSeverity::Error,
            EngineError::CacheError(_) => ErrorSeverity::Warning,
            EngineError::CancellationError(_) => ErrorSeverity::Info,
            EngineError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::EmptyDocument => ErrorCategory::Document,
            EngineError::BatchTranslationFailed { .. } => ErrorCategory::Batch,
            EngineError::LlmCallFailed(_) => ErrorCategory::Llm,
            EngineError::StructuredOutputUnavailable(_) => ErrorCategory::Llm,
            EngineError::StorageError(_) => ErrorCategory::Storage,
            EngineError::SerializationError(_) => ErrorCategory::Serialization,
            EngineError::ConfigError(_) => ErrorCategory::Config,
            EngineError::CacheError(_) => ErrorCategory::Cache,
            EngineError::CancellationError(_) => ErrorCategory::Cancellation,
            EngineError::InternalError(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}

impl From<redb::Error> for EngineError {
    fn from(e: redb::Error) -> Self {
        EngineError::StorageError(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Running tallies of contained (logged-and-swallowed) errors, grouped the
/// way the host's `ErrorStats` groups translation errors.
#[derive(Debug, Default, Clone)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: HashMap<&'static str, usize>,
    pub by_severity: HashMap<&'static str, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    pub fn record(&mut self, err: &EngineError) {
        self.total_errors += 1;
        *self.by_category.entry(category_label(err.category())).or_insert(0) += 1;
        *self.by_severity.entry(severity_label(err.severity())).or_insert(0) += 1;
        if err.is_retryable() {
            self.retryable_errors += 1;
        }
        if matches!(err.severity(), ErrorSeverity::Critical) {
            self.critical_errors += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn category_label(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Document => "document",
        ErrorCategory::Batch => "batch",
        ErrorCategory::Llm => "llm",
        ErrorCategory::Storage => "storage",
        ErrorCategory::Serialization => "serialization",
        ErrorCategory::Config => "config",
        ErrorCategory::Cache => "cache",
        ErrorCategory::Cancellation => "cancellation",
        ErrorCategory::Internal => "internal",
    }
}

fn severity_label(severity: ErrorSeverity) -> &'static str {
    match severity {
        ErrorSeverity::Info => "info",
        ErrorSeverity::Warning => "warning",
        ErrorSeverity::Error => "error",
        ErrorSeverity::Critical => "critical",
    }
}

/// Log a contained (non-fatal) error at the severity it reports and return
/// a caller-supplied fallback value. Used at every auxiliary-failure site
/// named in spec §7 (kinds 3-6): the error never propagates past this
/// call.
pub fn log_and_contain<T>(err: EngineError, fallback: T) -> T {
    match err.severity() {
        ErrorSeverity::Info => tracing::info!(error = %err, "contained"),
        ErrorSeverity::Warning => tracing::warn!(error = %err, "contained"),
        ErrorSeverity::Error => tracing::error!(error = %err, "contained"),
        ErrorSeverity::Critical => tracing::error!(error = %err, "contained (critical)"),
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_error_severity_and_not_retryable() {
        let err = EngineError::EmptyDocument;
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert!(!err.is_retryable());
    }

    #[test]
    fn llm_call_failed_is_retryable() {
        assert!(EngineError::LlmCallFailed("timeout".into()).is_retryable());
    }

    #[test]
    fn stats_record_tracks_totals() {
        let mut stats = ErrorStats::default();
        stats.record(&EngineError::InternalError("boom".into()));
        stats.record(&EngineError::LlmCallFailed("slow".into()));
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.critical_errors, 1);
        assert_eq!(stats.retryable_errors, 1);
    }
}
