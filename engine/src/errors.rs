//! Faculty error types
//!
//! Only conditions that stop work are errors. Budget exhaustion, cache misses
//! and an empty vision queue are ordinary outcomes and never appear here:
//! budget conditions surface as stop reasons in reports, a miss is `None`,
//! and an empty queue ends a ritual with `RitualStop::QueueEmpty`.

use thiserror::Error;

/// Error category for structured logging and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `faculty.toml` or env misconfigured
    ConfigError,
    /// Repository context missing, unreadable or malformed
    ContextUnavailable,
    /// Result cache database failures
    CacheError,
    /// Vision queue storage failures and rejected transitions
    QueueError,
    /// Archive payload, report or index could not be written
    ArchiveWriteFailure,
    /// Unexpected logic bugs
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::ContextUnavailable => "CONTEXT_UNAVAILABLE",
            Self::CacheError => "CACHE_ERROR",
            Self::QueueError => "QUEUE_ERROR",
            Self::ArchiveWriteFailure => "ARCHIVE_WRITE_FAILURE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether a consultation run can continue after this error.
    ///
    /// A failed archive write only blocks completion of the vision being
    /// archived; the ritual moves on to the next one.
    pub fn recoverable(&self) -> bool {
        matches!(self, Self::ArchiveWriteFailure | Self::CacheError)
    }
}

/// Faculty error with category and context
#[derive(Debug, Error)]
pub enum FacultyError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("repository context unavailable: {message}")]
    ContextUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("result cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("vision queue error: {message}")]
    Queue {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("vision {vision_id} cannot move from {from} to {to}")]
    InvalidTransition {
        vision_id: String,
        from: String,
        to: String,
    },

    #[error("vision {vision_id} is no longer claimed by this ritual")]
    StaleClaim { vision_id: String },

    #[error("archive write failed: {message}")]
    ArchiveWrite {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FacultyError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::ContextUnavailable { .. } => ErrorCategory::ContextUnavailable,
            Self::Cache { .. } => ErrorCategory::CacheError,
            Self::Queue { .. } | Self::InvalidTransition { .. } | Self::StaleClaim { .. } => {
                ErrorCategory::QueueError
            }
            Self::ArchiveWrite { .. } => ErrorCategory::ArchiveWriteFailure,
            Self::Internal { .. } => ErrorCategory::InternalError,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn context(message: impl Into<String>) -> Self {
        Self::ContextUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn context_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ContextUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn cache_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
            source: None,
        }
    }

    pub fn queue_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Queue {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::ArchiveWrite {
            message: message.into(),
            source: None,
        }
    }

    pub fn archive_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ArchiveWrite {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for Faculty operations
pub type Result<T> = std::result::Result<T, FacultyError>;
