use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use time::OffsetDateTime;

use super::cookies;
use super::error::store_error;
use super::state::AppState;
use super::traits::SessionStore;
use crate::error::Error;
use crate::oauth::Token;
use crate::types::SessionId;

/// Session with a live Basecamp token, extracted from the session cookie.
///
/// Use as an Axum extractor in route handlers. Rejects with `401 Unauthorized`
/// when the cookie, the session or a non-expired token is missing.
///
/// ```rust,ignore
/// async fn projects(State(state): State<AppState<S>>, auth: Authenticated) -> ... {
///     state.basecamp.fetch_projects(auth.access_token()).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session_id: SessionId,
    token: Token,
}

impl Authenticated {
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.token.access_token()
    }
}

impl<S: SessionStore> FromRequestParts<AppState<S>> for Authenticated {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::Auth("Not authenticated".into()))?;

        let session_id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
            .ok_or_else(|| Error::Auth("Not authenticated".into()))?;

        let session = state
            .sessions
            .load(&session_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| Error::Auth("Session expired".into()))?;

        let token = session
            .valid_token(OffsetDateTime::now_utc())
            .cloned()
            .ok_or_else(|| Error::Auth("No valid Basecamp token, log in again".into()))?;

        Ok(Self { session_id, token })
    }
}
