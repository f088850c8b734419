#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// OAuth2 exchange failed, or the session carries no usable token.
    #[error("Authentication error: {0}")]
    Auth(String),
    /// A caller-supplied field is missing or empty.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A request body exceeded the configured size limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    /// Basecamp answered with a non-success status.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },
    /// A nested resource the response should have referenced is absent.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Session store error: {0}")]
    Store(String),
}

impl Error {
    /// Short machine-readable category, used as the `error` field of JSON responses.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::Validation(_) => "validation_error",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Upstream { .. } => "upstream_error",
            Self::NotFound(_) => "not_found",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
            Self::Store(_) => "store_error",
        }
    }
}
