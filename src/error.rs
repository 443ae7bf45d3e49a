/* src/error.rs */

use thiserror::Error;

/// Result type alias for operations that may fail with `ClientIpError`.
pub type Result<T> = std::result::Result<T, ClientIpError>;

/// Errors that can occur while detecting a client IP.
///
/// Detectors never surface these; they degrade to "no address". The parsing
/// helpers and the axum extractor do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientIpError {
    /// Invalid IP address format.
    #[error("Invalid IP address format: {0:?}")]
    InvalidIpFormat(String),

    /// Peer address is not in `host:port` form or its host is not an IP.
    #[error("Invalid remote address: {0:?}")]
    InvalidRemoteAddr(String),

    /// No detector produced a client IP for the request.
    #[error("Client IP could not be determined")]
    Undetermined,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ClientIpError {
    fn into_response(self) -> axum::response::Response {
        (axum::http::StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
