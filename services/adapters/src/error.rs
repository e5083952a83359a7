//! Error types for the market feed

use thiserror::Error;
use types::VenueId;

/// Result type alias for market feed operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter, provider and feed handler operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Frame is not valid structured text
    #[error("Parse error for venue {venue}: {message}")]
    Parse {
        /// The venue that sent the frame
        venue: VenueId,
        /// Parser error description
        message: String,
    },

    /// Frame parsed but a required field is missing or mistyped
    #[error("Schema error for venue {venue}: {field}")]
    Schema {
        /// The venue that sent the frame
        venue: VenueId,
        /// Description of the offending field
        field: String,
    },

    /// A single price level in a book batch could not be parsed
    #[error("Malformed level for venue {venue}: {level}")]
    MalformedLevel {
        /// The venue that sent the level
        venue: VenueId,
        /// Raw level text
        level: String,
    },

    /// Provider could not be initialized
    #[error("Initialization failed for venue {venue}: {reason}")]
    Initialization {
        /// The venue whose provider failed
        venue: VenueId,
        /// Reason for the failure
        reason: String,
    },

    /// Configured venue name has no adapter
    #[error("Unsupported exchange: {0}")]
    UnsupportedVenue(String),

    /// Connection-related errors
    #[error("Connection failed for venue {venue}: {reason}")]
    ConnectionFailed {
        /// The venue that failed to connect
        venue: VenueId,
        /// Reason for the failure
        reason: String,
    },

    /// Connection timeout during establish or receive operations
    #[error("Connection timeout for venue {venue} after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The venue that timed out
        venue: VenueId,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Connection closed by the remote side
    #[error("Connection closed for venue {venue}: {reason:?}")]
    ConnectionClosed {
        /// The venue whose connection was closed
        venue: VenueId,
        /// Optional reason for closure
        reason: Option<String>,
    },

    /// Recovery errors
    #[error("Maximum reconnection attempts ({max_attempts}) exceeded for venue {venue}")]
    MaxReconnectAttemptsExceeded {
        /// The venue that failed to reconnect
        venue: VenueId,
        /// Maximum attempts that were tried
        max_attempts: u32,
    },

    /// Configuration error in feed settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization or parsing error
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// System errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error during network operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    /// Shorthand for a schema violation
    pub fn schema(venue: VenueId, field: impl Into<String>) -> Self {
        AdapterError::Schema {
            venue,
            field: field.into(),
        }
    }

    /// Check if this error is recoverable through retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionFailed { .. }
                | AdapterError::ConnectionTimeout { .. }
                | AdapterError::ConnectionClosed { .. }
                | AdapterError::WebSocket(_)
                | AdapterError::Io(_)
        )
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AdapterError::Configuration(_)
                | AdapterError::UnsupportedVenue(_)
                | AdapterError::MaxReconnectAttemptsExceeded { .. }
        )
    }
}

impl From<types::VenueParseError> for AdapterError {
    fn from(err: types::VenueParseError) -> Self {
        match err {
            types::VenueParseError::Unsupported(name) => AdapterError::UnsupportedVenue(name),
        }
    }
}
