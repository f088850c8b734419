use std::net::SocketAddr;

use axum_extra::extract::cookie::Key;
use url::Url;

use crate::basecamp::BasecampConfig;
use crate::error::Error;
use crate::oauth::OAuthConfig;

/// Runtime settings of the web layer.
#[derive(Clone)]
pub(crate) struct WebSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) login_redirect: String,
    pub(crate) max_upload_bytes: usize,
}

impl WebSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__basecamp_session".into(),
            // Launchpad access tokens live two weeks.
            session_ttl_days: 14,
            secure_cookies: true,
            login_redirect: "/projects".into(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Server configuration.
///
/// Required credentials are constructor parameters, so the server never
/// starts with empty ones.
///
/// Use [`from_env()`](AppConfig::from_env) for convention-based setup,
/// or [`new()`](AppConfig::new) with `with_*` methods for full control.
pub struct AppConfig {
    pub(super) oauth: OAuthConfig,
    pub(super) basecamp: BasecampConfig,
    pub(super) settings: WebSettings,
    pub(super) bind_addr: SocketAddr,
}

impl AppConfig {
    #[must_use]
    pub fn new(oauth: OAuthConfig, basecamp: BasecampConfig) -> Self {
        Self {
            oauth,
            basecamp,
            settings: WebSettings::defaults(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `BASECAMP_ACCOUNT_ID`: Basecamp account number
    /// - `BASECAMP_CLIENT_ID`: Launchpad client ID
    /// - `BASECAMP_CLIENT_SECRET`: Launchpad client secret
    /// - `BASECAMP_REDIRECT_URI`: OAuth2 callback URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `BASECAMP_AUTH_URL`, `BASECAMP_TOKEN_URL`: Override Launchpad endpoints
    /// - `BASECAMP_API_URL`: Override the Basecamp API root
    /// - `BASECAMP_USER_AGENT`: `User-Agent` for API calls
    /// - `COOKIE_KEY`: Cookie encryption key bytes (at least 64)
    /// - `INSECURE_COOKIES`: `"1"` or `"true"` drops the `Secure` cookie flag (plain-HTTP development)
    /// - `BIND_ADDR`: Listen address (default `0.0.0.0:8001`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or empty, or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{name} is required")))
        };
        let parse_url = |name: &str, value: String| {
            value
                .parse::<Url>()
                .map_err(|e| Error::Config(format!("{name}: {e}")))
        };

        let account_id = required("BASECAMP_ACCOUNT_ID")?;
        let client_id = required("BASECAMP_CLIENT_ID")?;
        let client_secret = required("BASECAMP_CLIENT_SECRET")?;
        let redirect_uri = parse_url("BASECAMP_REDIRECT_URI", required("BASECAMP_REDIRECT_URI")?)?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, redirect_uri);
        if let Some(value) = lookup("BASECAMP_AUTH_URL") {
            oauth = oauth.with_auth_url(parse_url("BASECAMP_AUTH_URL", value)?);
        }
        if let Some(value) = lookup("BASECAMP_TOKEN_URL") {
            oauth = oauth.with_token_url(parse_url("BASECAMP_TOKEN_URL", value)?);
        }

        let mut basecamp = BasecampConfig::new(account_id);
        if let Some(value) = lookup("BASECAMP_API_URL") {
            basecamp = basecamp.with_api_url(parse_url("BASECAMP_API_URL", value)?);
        }
        if let Some(agent) = lookup("BASECAMP_USER_AGENT") {
            basecamp = basecamp.with_user_agent(agent);
        }

        let insecure = matches!(
            lookup("INSECURE_COOKIES").as_deref(),
            Some("1") | Some("true"),
        );

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };

        let mut config = Self::new(oauth, basecamp)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!insecure);

        if let Some(addr) = lookup("BIND_ADDR") {
            let addr = addr
                .parse()
                .map_err(|e| Error::Config(format!("BIND_ADDR: {e}")))?;
            config = config.with_bind_addr(addr);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Where the browser lands after a successful login (default `/projects`).
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    /// Largest accepted attachment upload request, in bytes (default 50 MiB).
    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.settings.max_upload_bytes = limit;
        self
    }

    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Session lifetime, matching the session cookie's `Max-Age`.
    #[must_use]
    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::days(self.settings.session_ttl_days)
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    #[must_use]
    pub fn basecamp(&self) -> &BasecampConfig {
        &self.basecamp
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("BASECAMP_ACCOUNT_ID", "999"),
        ("BASECAMP_CLIENT_ID", "cid"),
        ("BASECAMP_CLIENT_SECRET", "secret"),
        ("BASECAMP_REDIRECT_URI", "http://localhost:8001/oauth/callback"),
    ];

    #[test]
    fn required_only_uses_defaults() {
        let config = AppConfig::from_lookup(env(REQUIRED)).unwrap();

        assert_eq!(config.oauth().client_id(), "cid");
        assert_eq!(
            config.oauth().auth_url().as_str(),
            "https://launchpad.37signals.com/authorization/new"
        );
        assert_eq!(config.basecamp().account_id(), "999");
        assert_eq!(config.basecamp().api_url().as_str(), "https://3.basecampapi.com/");
        assert_eq!(config.bind_addr(), "0.0.0.0:8001".parse().unwrap());
        assert!(config.settings.secure_cookies);
        assert_eq!(config.settings.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.session_ttl(), time::Duration::days(14));
    }

    #[test]
    fn each_required_var_fails_fast() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| k != missing).collect();
            let err = AppConfig::from_lookup(env(&pairs)).err().unwrap();
            assert!(
                matches!(&err, Error::Config(msg) if msg.contains(missing)),
                "{missing}: {err:?}"
            );
        }
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "BASECAMP_CLIENT_SECRET");
        pairs.push(("BASECAMP_CLIENT_SECRET", "  "));
        assert!(AppConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn invalid_redirect_uri() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "BASECAMP_REDIRECT_URI");
        pairs.push(("BASECAMP_REDIRECT_URI", "not a url"));
        let err = AppConfig::from_lookup(env(&pairs)).err().unwrap();
        assert!(matches!(err, Error::Config(msg) if msg.starts_with("BASECAMP_REDIRECT_URI")));
    }

    #[test]
    fn optional_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BASECAMP_TOKEN_URL", "http://127.0.0.1:9000/token"),
            ("BASECAMP_API_URL", "http://127.0.0.1:9000/api"),
            ("BASECAMP_USER_AGENT", "MyApp (ops@example.com)"),
            ("INSECURE_COOKIES", "true"),
            ("BIND_ADDR", "127.0.0.1:3000"),
        ]);
        let config = AppConfig::from_lookup(env(&pairs)).unwrap();

        assert_eq!(config.oauth().token_url().as_str(), "http://127.0.0.1:9000/token");
        assert_eq!(config.basecamp().api_url().as_str(), "http://127.0.0.1:9000/api/");
        assert_eq!(config.basecamp().user_agent(), "MyApp (ops@example.com)");
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000".parse().unwrap());
    }

    #[test]
    fn short_cookie_key_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("COOKIE_KEY", "too-short"));
        assert!(matches!(
            AppConfig::from_lookup(env(&pairs)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn invalid_bind_addr() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BIND_ADDR", "localhost"));
        assert!(AppConfig::from_lookup(env(&pairs)).is_err());
    }
}
