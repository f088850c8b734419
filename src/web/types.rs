use time::OffsetDateTime;

use crate::oauth::Token;

/// Server-side state of one browser session.
///
/// `oauth_state` lives from `/login` until the callback consumes it;
/// `oauth_token` lives from a successful callback until expiry or logout.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub oauth_state: Option<String>,
    pub oauth_token: Option<Token>,
}

impl Session {
    /// Session for a login that has just been started.
    #[must_use]
    pub fn pending(oauth_state: impl Into<String>) -> Self {
        Self {
            oauth_state: Some(oauth_state.into()),
            oauth_token: None,
        }
    }

    /// The stored token, unless it has expired as of `now`.
    #[must_use]
    pub fn valid_token(&self, now: OffsetDateTime) -> Option<&Token> {
        self.oauth_token
            .as_ref()
            .filter(|token| !token.is_expired_at(now))
    }
}
