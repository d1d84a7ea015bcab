//! Error types for link parsing and subscription resolution.

use thiserror::Error;

/// Per-link parse failure.
///
/// These never abort a batch conversion; the batch converter logs them with
/// the link's identity and drops the offending link from the output.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The link scheme is not one of vless/vmess/trojan/ss.
    /// Carries a short prefix of the offending link for log context.
    #[error("unsupported protocol in link: {0}…")]
    UnsupportedProtocol(String),

    /// The link could not be parsed as a URI at all.
    #[error("invalid link URI: {0}")]
    InvalidUri(url::ParseError),

    /// A URI-style link has no server hostname.
    #[error("missing server hostname")]
    MissingHost,

    /// The credential component (uuid or password) is empty after decoding.
    #[error("missing {0} in link")]
    MissingCredential(&'static str),

    /// A required logical field of a vmess payload is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The port component is absent or does not parse as an integer.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// A base64 payload failed to decode; carries the library error message.
    #[error("failed to decode base64 payload: {0}")]
    InvalidEncoding(String),

    /// A decoded vmess payload is not a well-formed JSON object.
    #[error("malformed vmess payload: {0}")]
    InvalidPayload(String),

    /// A shadowsocks credential block is missing one of its components.
    #[error("invalid shadowsocks credential format")]
    InvalidCredentialFormat,
}

impl From<url::ParseError> for ParseError {
    fn from(err: url::ParseError) -> Self {
        match err {
            url::ParseError::EmptyHost => ParseError::MissingHost,
            url::ParseError::InvalidPort => ParseError::InvalidPort(err.to_string()),
            other => ParseError::InvalidUri(other),
        }
    }
}

/// Subscription-level failure.
///
/// Fetch errors are caught at the subscription manager boundary and turned
/// into a persisted `last_error` string; they never propagate to the caller.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The subscription endpoint answered with a non-2xx status.
    #[error("subscription responded with {0}")]
    Status(u16),

    /// Transport-level failure talking to the subscription endpoint.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The cached/fetched payload could not be base64-decoded.
    /// Handled by falling back to treating the payload as plaintext.
    #[error("failed to decode subscription payload: {0}")]
    Decode(String),
}
