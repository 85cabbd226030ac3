//! # Error Handling
//!
//! Error types for the Palisade certificate-authority service, built on
//! `thiserror`. Two kinds carry the domain semantics: [`Error::NotFound`]
//! (missing CA, role, client or certificate) and [`Error::Validation`]
//! (TTL ceiling exceeded, CN rejected by role policy, malformed CSR).
//! [`Error::Conflict`] covers attempts to re-create an existing CA. The
//! remaining variants are ambient failures surfaced by the stores and the
//! crypto layer.

/// Custom result type for Palisade operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Palisade service
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A CA, role, client, client role or certificate does not exist
    #[error("{0}")]
    NotFound(String),

    /// A request violated TTL or role policy, or carried a malformed body
    #[error("{0}")]
    Validation(String),

    /// The target already exists and cannot be re-created
    #[error("{0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob store I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors for stored records
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Key generation, certificate building or signing failures
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::Config(_)
            | Error::Io { .. }
            | Error::Serialization { .. }
            | Error::Crypto(_)
            | Error::Internal(_) => 500,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<rcgen::Error> for Error {
    fn from(error: rcgen::Error) -> Self {
        Self::Crypto(error.to_string())
    }
}

impl From<rsa::Error> for Error {
    fn from(error: rsa::Error) -> Self {
        Self::Crypto(error.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
