//! Error types for directory toolkit operations.
//!
//! The taxonomy separates failures the caller must handle differently:
//! transport problems, features the server does not advertise, schema
//! gaps, malformed protocol state and plain directory result codes.

use crate::negotiation::Capability;
use crate::protocol::ResultCode;

/// Main error type for toolkit operations.
///
/// Every variant propagates to the immediate caller unchanged. Nothing in the
/// toolkit retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    /// The session could not complete a round trip (transport failure,
    /// unreadable metadata). Not attributable to directory business logic.
    #[error("Session error during {operation}: {source}")]
    Session {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required optional control or extended operation is not advertised.
    #[error("Server does not advertise {capability}")]
    UnsupportedFeature { capability: Capability },

    /// An attribute named in a sort specification is not defined in the
    /// server schema.
    #[error("Attribute '{attribute}' is not defined in the server schema")]
    Schema { attribute: String },

    /// A response control was missing or malformed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered a well-formed request with a non-success code.
    #[error("{operation} failed with result code {code}: {message}")]
    DirectoryResult {
        operation: &'static str,
        code: ResultCode,
        message: String,
    },

    /// Caller-supplied parameters that cannot produce a valid request.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Problems with controls carried on responses.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A response control the exchange depends on was absent.
    #[error("Expected response control {oid} is missing")]
    MissingControl { oid: &'static str },

    /// A response control was present but its value could not be decoded.
    #[error("Response control {oid} is malformed")]
    MalformedControl { oid: String },

    /// The window response control stopped reporting a content count after
    /// the sequence had started.
    #[error("Virtual list view response dropped its content count at offset {offset}")]
    MissingContentCount { offset: u32 },

    /// A read-entry control described a different entry than the one modified.
    #[error("Read entry control returned unexpected entry '{dn}'")]
    UnexpectedEntry { dn: String },
}

// Convenience methods for creating common errors
impl ToolkitError {
    /// Wrap a session error
    pub fn session<E>(operation: &'static str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Session {
            operation,
            source: Box::new(error),
        }
    }

    /// Create an unsupported feature error
    pub fn unsupported(capability: Capability) -> Self {
        Self::UnsupportedFeature { capability }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a directory result error
    pub fn directory(
        operation: &'static str,
        code: ResultCode,
        message: impl Into<String>,
    ) -> Self {
        Self::DirectoryResult {
            operation,
            code,
            message: message.into(),
        }
    }

    /// Directory result code carried by this error, if any.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::DirectoryResult { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the failure is a missing server capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature { .. })
    }
}

impl ProtocolError {
    pub fn malformed(oid: impl Into<String>) -> Self {
        Self::MalformedControl { oid: oid.into() }
    }
}

// Result type aliases for convenience
pub type ToolkitResult<T> = Result<T, ToolkitError>;
