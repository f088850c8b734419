use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::error::Error;
use crate::nonce;

const DEFAULT_AUTH_URL: &str = "https://launchpad.37signals.com/authorization/new";
const DEFAULT_TOKEN_URL: &str = "https://launchpad.37signals.com/authorization/token";

/// Launchpad `OAuth2` configuration.
///
/// Required fields are constructor parameters, so a config can never exist
/// with missing credentials.
///
/// ```rust,ignore
/// use basecamp_bridge::OAuthConfig;
///
/// let config = OAuthConfig::new("client-id", "secret", "http://localhost:8001/oauth/callback".parse()?);
/// // Optional overrides via chaining:
/// let config = config.with_token_url("http://localhost:9000/token".parse()?);
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect_uri: Url,
}

impl OAuthConfig {
    /// Create a new `OAuth2` configuration pointing at Launchpad.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            auth_url: DEFAULT_AUTH_URL.parse().expect("valid default URL"),
            token_url: DEFAULT_TOKEN_URL.parse().expect("valid default URL"),
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization endpoint URL.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Token exchange endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish()
    }
}

/// Drives the Launchpad authorization-code flow.
///
/// Holds only the read-only client credentials; the per-login state and the
/// resulting token belong to the caller's session.
pub struct AuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

/// Authorization URL plus the anti-CSRF state to store in the session.
#[derive(Debug)]
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Token response from the Launchpad token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Bearer credential held in a browser session.
#[derive(Clone)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<OffsetDateTime>,
}

impl Token {
    /// Build a token from a token endpoint response received at `now`.
    #[must_use]
    pub fn from_response(response: TokenResponse, now: OffsetDateTime) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| now.checked_add(Duration::seconds(secs)));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    /// Token with no known expiry.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Set an explicit expiry instant.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    /// Whether the token has expired as of `now`. Tokens without expiry never do.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Query parameters Launchpad appends to the redirect URI.
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Generate the authorization URL with a fresh state value.
    ///
    /// The returned `state` must be stored in the session and handed back to
    /// [`complete_login`](Self::complete_login).
    #[must_use]
    pub fn begin_login(&self) -> AuthorizationRequest {
        let state = nonce::generate_state();

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("type", "web_server")
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("state", &state);

        AuthorizationRequest {
            url: url.into(),
            state,
        }
    }

    /// Verify the callback and exchange its authorization code for a token.
    ///
    /// State is checked before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the provider reported an error, the code or
    /// state is missing, the state does not match `stored_state`, or the
    /// exchange fails for any reason.
    pub async fn complete_login(
        &self,
        callback_url: &Url,
        stored_state: &str,
    ) -> Result<Token, Error> {
        let params = CallbackParams::from_url(callback_url);

        if let Some(error) = params.error {
            return Err(Error::Auth(format!("authorization denied: {error}")));
        }
        let received_state = params
            .state
            .ok_or_else(|| Error::Auth("missing state".into()))?;
        if stored_state.is_empty() || received_state != stored_state {
            return Err(Error::Auth("state mismatch".into()));
        }
        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Auth("missing authorization code".into()))?;

        let response = self
            .exchange_code(&code)
            .await
            .map_err(|e| Error::Auth(format!("token exchange failed: {e}")))?;

        Ok(Token::from_response(response, OffsetDateTime::now_utc()))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let params = [
            ("type", "web_server"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<TokenResponse>().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::{self, Hits};

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "test-client",
            "test-secret",
            "http://localhost:8001/oauth/callback".parse().unwrap(),
        )
    }

    fn callback(query: &str) -> Url {
        format!("http://localhost:8001/oauth/callback?{query}")
            .parse()
            .unwrap()
    }

    async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Response {
        let valid = form.get("code").map(String::as_str) == Some("good-code")
            && form.get("type").map(String::as_str) == Some("web_server")
            && form.get("client_id").map(String::as_str) == Some("test-client")
            && form.get("client_secret").map(String::as_str) == Some("test-secret");
        if !valid {
            return (StatusCode::UNAUTHORIZED, "invalid_grant").into_response();
        }
        Json(json!({
            "access_token": "access-123",
            "refresh_token": "refresh-456",
            "expires_in": 1_209_600
        }))
        .into_response()
    }

    async fn client_with_token_server() -> (AuthClient, Hits) {
        let router = Router::new().route("/authorization/token", post(token_endpoint));
        let (base, hits) = test_support::serve_counted(router).await;
        let client = AuthClient::new(
            test_config().with_token_url(base.join("authorization/token").unwrap()),
        );
        (client, hits)
    }

    #[test]
    fn test_begin_login_url_parameters() {
        let client = AuthClient::new(test_config());
        let req = client.begin_login();
        let url: Url = req.url.parse().unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(req.url.starts_with(DEFAULT_AUTH_URL));
        assert_eq!(pairs["type"], "web_server");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "test-client");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8001/oauth/callback");
        assert_eq!(pairs["state"], req.state);
        assert!(!pairs.contains_key("client_secret"));
    }

    #[test]
    fn test_begin_login_state_unique_per_call() {
        let client = AuthClient::new(test_config());
        assert_ne!(client.begin_login().state, client.begin_login().state);
    }

    #[test]
    fn test_config_with_overrides() {
        let config = test_config()
            .with_auth_url("https://auth.example.com/new".parse().unwrap())
            .with_token_url("https://auth.example.com/token".parse().unwrap());

        assert_eq!(config.auth_url().as_str(), "https://auth.example.com/new");
        assert_eq!(config.token_url().as_str(), "https://auth.example.com/token");
        assert_eq!(config.client_id(), "test-client");
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("test-secret"));
    }

    #[test]
    fn test_token_expiry() {
        let now = OffsetDateTime::now_utc();
        let response = TokenResponse {
            access_token: "a".into(),
            expires_in: Some(60),
            refresh_token: None,
        };
        let token = Token::from_response(response, now);

        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(60)));
        assert!(!Token::bearer("b").is_expired_at(now + Duration::days(365)));
    }

    #[tokio::test]
    async fn test_complete_login_success() {
        let (client, hits) = client_with_token_server().await;

        let token = client
            .complete_login(&callback("code=good-code&state=abc"), "abc")
            .await
            .unwrap();

        assert_eq!(token.access_token(), "access-123");
        assert_eq!(token.refresh_token(), Some("refresh-456"));
        assert!(token.expires_at().is_some());
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_complete_login_state_mismatch_skips_exchange() {
        let (client, hits) = client_with_token_server().await;

        let err = client
            .complete_login(&callback("code=good-code&state=forged"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)), "got {err:?}");
        assert_eq!(hits.count(), 0);
    }

    #[tokio::test]
    async fn test_complete_login_missing_state() {
        let (client, hits) = client_with_token_server().await;

        let err = client
            .complete_login(&callback("code=good-code"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(hits.count(), 0);
    }

    #[tokio::test]
    async fn test_complete_login_empty_stored_state_never_matches() {
        let (client, hits) = client_with_token_server().await;

        let err = client
            .complete_login(&callback("code=good-code&state="), "")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(hits.count(), 0);
    }

    #[tokio::test]
    async fn test_complete_login_provider_error() {
        let client = AuthClient::new(test_config());

        let err = client
            .complete_login(&callback("error=access_denied&state=abc"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("access_denied")));
    }

    #[tokio::test]
    async fn test_complete_login_missing_code() {
        let client = AuthClient::new(test_config());

        let err = client
            .complete_login(&callback("state=abc"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_complete_login_rejected_code() {
        let (client, hits) = client_with_token_server().await;

        let err = client
            .complete_login(&callback("code=bad-code&state=abc"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("401")), "got {err:?}");
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_complete_login_network_failure() {
        // Nothing listens on the discard port.
        let client = AuthClient::new(
            test_config().with_token_url("http://127.0.0.1:9/authorization/token".parse().unwrap()),
        );

        let err = client
            .complete_login(&callback("code=good-code&state=abc"), "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
    }
}
