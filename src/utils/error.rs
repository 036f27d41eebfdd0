//! Error types for Binix shields

use thiserror::Error;

/// Main error type for shields operations
#[derive(Debug, Error)]
pub enum ShieldsError {
    /// A resource or page URL could not be parsed or resolved
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// Message encoding/decoding failed
    #[error("message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    /// A page binding the shim needs to wrap is absent
    #[error("missing page binding: {0}")]
    MissingBinding(&'static str),
    /// A page binding exists but cannot be redefined
    #[error("page binding is not configurable: {0}")]
    LockedBinding(&'static str),
    /// Security token could not be generated
    #[error("failed to generate security token")]
    TokenGeneration,
    /// Invalid configuration or fixture
    #[error("configuration error: {0}")]
    Config(String),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShieldsError {
    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}

/// Exceptions raised by page primitives (the values page code would see thrown)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomException {
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("InvalidStateError: {0}")]
    InvalidState(String),
    #[error("NetworkError: failed to load {0}")]
    Network(String),
    #[error("TypeError: {0}")]
    Type(String),
}

/// Convenience Result type for shields operations
pub type Result<T> = std::result::Result<T, ShieldsError>;
