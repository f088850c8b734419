use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::WebSettings;
use super::traits::SessionStore;
use crate::basecamp::BasecampClient;
use crate::oauth::AuthClient;

/// Shared state for route handlers.
pub struct AppState<S> {
    pub(super) auth: Arc<AuthClient>,
    pub(super) basecamp: Arc<BasecampClient>,
    pub(super) sessions: Arc<S>,
    pub(super) settings: WebSettings,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            basecamp: self.basecamp.clone(),
            sessions: self.sessions.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<AppState<S>> for Key {
    fn from_ref(state: &AppState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
