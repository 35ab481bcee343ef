use crate::document::DocumentId;
use crate::store::StoreError;

#[cfg(test)]
pub(crate) mod testing;

/// Broad category of a [`CacheFieldError`]
///
/// Configuration errors are the only ones raised synchronously, at
/// registration. Everything else surfaces from a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Derivation,
    Write,
    Panic,
    Queue,
    Serialization,
}

impl ErrorKind {
    /// Stable short code, used as a structured field in logs
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CF001",
            ErrorKind::Derivation => "CF101",
            ErrorKind::Write => "CF102",
            ErrorKind::Panic => "CF103",
            ErrorKind::Queue => "CF201",
            ErrorKind::Serialization => "CF301",
        }
    }
}

/// Main error type for cached field rules
#[derive(Debug, thiserror::Error)]
pub enum CacheFieldError {
    // ============ Registration ============
    /// Invalid rule declaration (bad field name, bad derive, ...)
    #[error("Configuration error for '{parameter}': {reason} (value: {value})")]
    Configuration {
        parameter: String,
        value: String,
        reason: String,
    },

    // ============ Deferred recompute ============
    /// The derive function failed
    #[error("Failed to derive '{cached_field}' for document '{document_id}': {reason}")]
    Derivation {
        cached_field: String,
        document_id: DocumentId,
        reason: String,
    },

    /// The scoped update of the cached field failed
    #[error("Failed to write '{cached_field}' on document '{document_id}': {source}")]
    Write {
        cached_field: String,
        document_id: DocumentId,
        #[source]
        source: StoreError,
    },

    /// The deferred recompute panicked (derive function or store write)
    #[error("Deferred update of '{cached_field}' for document '{document_id}' panicked: {message}")]
    Panicked {
        cached_field: String,
        document_id: DocumentId,
        message: String,
    },

    // ============ Queue ============
    /// Cascading cached writes kept the queue busy for too many rounds
    #[error(
        "Deferred queue exceeded {max_rounds} flush rounds ({processed} tasks processed). \
         Possible cascade loop between rules."
    )]
    FlushDepthExceeded { max_rounds: usize, processed: usize },

    /// Serialization/deserialization failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl CacheFieldError {
    pub fn kind(&self) -> ErrorKind {
        use CacheFieldError::*;
        match self {
            Configuration { .. } => ErrorKind::Configuration,
            Derivation { .. } => ErrorKind::Derivation,
            Write { .. } => ErrorKind::Write,
            Panicked { .. } => ErrorKind::Panic,
            FlushDepthExceeded { .. } => ErrorKind::Queue,
            Serialization { .. } => ErrorKind::Serialization,
        }
    }

    /// Shorthand for a [`CacheFieldError::Configuration`]
    pub fn configuration(
        parameter: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CacheFieldError::Configuration {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for cached field operations
pub type CacheFieldResult<T> = Result<T, CacheFieldError>;

impl From<serde_json::Error> for CacheFieldError {
    fn from(e: serde_json::Error) -> Self {
        CacheFieldError::Serialization {
            message: format!("JSON serialization error: {}", e),
        }
    }
}
