//! Error types for the Xiaofubao client library.

/// Convenience alias for results produced by this crate.
pub type Result<T> = core::result::Result<T, XfbError>;

/// All errors that can occur when talking to the Xiaofubao service.
///
/// The client classifies every failed request into exactly one of these
/// variants so callers can decide whether a retry makes sense. The library
/// itself never retries.
#[derive(Debug, thiserror::Error)]
pub enum XfbError {
    /// Missing or invalid configuration (base URL, credential, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request never produced an HTTP response (connection, DNS, TLS).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status outside the 200..300 range.
    #[error("unexpected HTTP status {code}")]
    HttpStatus {
        /// The offending HTTP status code.
        code: u16,
    },

    /// The response body was not a well-formed envelope.
    #[error("could not decode response body: {detail}")]
    Decode {
        /// Human-readable description of what failed to decode.
        detail: String,
    },

    /// The envelope carried a non-zero `statusCode` (application error).
    #[error("server rejected the request: {message} (status {code})")]
    Api {
        /// The remote `statusCode` value.
        code: i32,
        /// The human-readable (possibly localized) server message.
        message: String,
    },

    /// The authorization redirect sequence did not yield the expected
    /// `state`, `code`, or session credential.
    #[error("credential exchange failed: {0}")]
    AuthExchange(String),

    /// The durable settings backend failed.
    #[error("settings storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),
}

impl From<serde_json::Error> for XfbError {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            detail: err.to_string(),
        }
    }
}
