//! Error handling for the console coordinator
//!
//! Errors only surface at the crate boundary (configuration, wire decoding,
//! submitting into a stopped dispatch loop). Inside the loop every failure
//! degrades to "log and continue".

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config error (malformed environment value etc.)
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error (threat level, person type, ...)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Envelope carried an event type outside the closed taxonomy
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dispatch loop is no longer running
    #[error("Dispatch loop closed")]
    ChannelClosed,
}

impl Error {
    /// Stable machine-readable code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::UnknownEventKind(_) => "UNKNOWN_EVENT_KIND",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::ChannelClosed => "CHANNEL_CLOSED",
        }
    }
}
