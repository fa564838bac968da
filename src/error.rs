use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field or configuration key that caused the error (e.g., "batch_size", "base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the rejected value)
    pub details: Option<String>,
    /// Source of the error (e.g., "insert_config", "insert_client")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the insert and query clients.
#[derive(Debug, Error)]
pub enum Error {
    #[error("batching is not enabled for this client; call start() first")]
    NotInitialized,

    #[error("the insert client is already running in batch mode")]
    AlreadyStarted,

    #[error("the batching pipeline has been shut down")]
    Closed,

    #[error("Invalid configuration: {message}{}", format_context(.context))]
    InvalidConfiguration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("send attempt {attempt} failed: {source}")]
    TransientSendFailure {
        attempt: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("retry limit reached after {attempts} attempts, abandoning {events} events: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        events: usize,
        last_error: Box<Error>,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("bad response from Insights: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidConfiguration {
            message: msg.into(),
            context,
        }
    }

    /// Create a validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidConfiguration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether a single failed send attempt may succeed if tried again.
    ///
    /// The transmitter retries every failure up to its bound; this is
    /// reported as the `transient` log field and observer event field.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Transport(_) => true,
            Error::Remote { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Error::TransientSendFailure { .. } => true,
            _ => false,
        }
    }
}
