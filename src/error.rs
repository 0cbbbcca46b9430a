//! Error types shared by the envelope builders and the transport client.

use thiserror::Error;

/// Hint printed whenever the site ID or API token is missing.
pub const CONFIGURE_HINT: &str = "jirafe config set --site-id YOUR_SITE_ID --token YOUR_TOKEN";

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a tracking or read-back call.
///
/// Every variant carries a single human-readable message; callers render it
/// verbatim and never branch on anything finer than [`Error::is_configuration`].
#[derive(Debug, Error)]
pub enum Error {
    /// Site ID or API token is empty. Raised before any network I/O.
    #[error("Not configured. Run: {}", CONFIGURE_HINT)]
    NotConfigured,

    /// The stored API token cannot be sent as an HTTP header value.
    #[error("Invalid API token: {0}")]
    InvalidCredentials(String),

    /// The HTTP call failed: non-2xx status, network failure or unreadable body.
    #[error("{0}")]
    Request(String),

    /// Caller-supplied structured data could not be used as an event payload.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// True for the errors raised by the configuration gate.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::InvalidCredentials(_))
    }

    pub(crate) fn request_failed(cause: impl std::fmt::Display) -> Self {
        Self::Request(format!("Request failed: {}", cause))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}
