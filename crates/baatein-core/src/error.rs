use thiserror::Error;

/// Top-level error type for startup and configuration.
///
/// Runtime failures of the conversation pipeline live in `baatein-chat`;
/// this enum covers what can go wrong before the bot starts polling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BaateinError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for BaateinError {
    fn from(err: toml::de::Error) -> Self {
        BaateinError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BaateinError {
    fn from(err: toml::ser::Error) -> Self {
        BaateinError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BaateinError {
    fn from(err: serde_json::Error) -> Self {
        BaateinError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Baatein startup operations.
pub type Result<T> = std::result::Result<T, BaateinError>;

// =============================================================================
// Upstream failures
// =============================================================================

/// Classification of a failed call to an external collaborator
/// (transcription, text generation, speech synthesis, audio encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamKind {
    /// Credentials rejected.
    Auth,
    /// Provider asked us to slow down.
    RateLimited,
    /// Provider temporarily unable to serve the request.
    Unavailable,
    /// Connection or timeout failure before a response arrived.
    Network,
    /// The request itself was rejected (malformed audio, empty text, ...).
    BadInput,
    /// The addressed resource (model, voice, binary, file) does not exist.
    NotFound,
}

impl UpstreamKind {
    /// Whether a failure of this kind is expected to succeed on retry.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            UpstreamKind::RateLimited | UpstreamKind::Unavailable | UpstreamKind::Network
        )
    }

    /// Map an HTTP status code to a failure kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => UpstreamKind::Auth,
            404 => UpstreamKind::NotFound,
            408 => UpstreamKind::Network,
            429 => UpstreamKind::RateLimited,
            500..=599 => UpstreamKind::Unavailable,
            _ => UpstreamKind::BadInput,
        }
    }
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpstreamKind::Auth => "authentication failed",
            UpstreamKind::RateLimited => "rate limited",
            UpstreamKind::Unavailable => "service unavailable",
            UpstreamKind::Network => "network error",
            UpstreamKind::BadInput => "bad input",
            UpstreamKind::NotFound => "not found",
        };
        f.write_str(s)
    }
}

/// A failed call to an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build from a non-success HTTP response.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(UpstreamKind::from_status(status), format!("HTTP {}: {}", status, body.into()))
    }

    /// Build from a transport-level failure (no HTTP response received).
    ///
    /// Connect and timeout failures are `Network`; anything else is treated
    /// as the provider being unavailable.
    pub fn transport(connect_or_timeout: bool, message: impl Into<String>) -> Self {
        let kind = if connect_or_timeout {
            UpstreamKind::Network
        } else {
            UpstreamKind::Unavailable
        };
        Self::new(kind, message)
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(UpstreamKind::BadInput, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
