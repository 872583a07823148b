//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rootcause::Report;
use secrecy::ExposeSecret;
use tokenbridge_oauth::{
    AuthorizedClient, CallbackHandler, ConsentRedirector, ProviderConfig, TokenExchanger,
    http_client,
};
use tokenbridge_session::{SessionBinder, SessionStore};
use url::Url;

use crate::config::{ResourceConfig, ServerConfig};
use crate::error::StartupError;

/// Paths served by the router itself; the callback path must not collide.
pub const RESERVED_PATHS: [&str; 4] = ["/", "/login", "/resource", "/config"];

/// Cookie attributes shared by every cookie the server sets.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    /// Whether cookies carry the Secure flag.
    pub secure: bool,
    /// Lifetime of the session cookie.
    pub session_max_age: time::Duration,
}

/// Everything a handler needs; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ProviderConfig>,
    pub consent: ConsentRedirector,
    pub callback: CallbackHandler,
    pub binder: SessionBinder,
    pub client: AuthorizedClient,
    pub resource: Arc<ResourceConfig>,
    pub cookies: CookieSettings,
    callback_path: Arc<str>,
    key: Key,
}

impl AppState {
    /// Wires the flow components from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::InvalidConfig` if the provider settings,
    /// the callback path, or the HTTP client cannot be set up.
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, Report<StartupError>> {
        config.validate()?;

        let provider = Arc::new(config.provider.clone());
        let wrap = |report: Report<tokenbridge_oauth::OAuthError>| {
            report.context(StartupError::invalid_config(
                "provider",
                "could not initialize the OAuth2 client",
            ))
        };

        let http = http_client(Duration::from_secs(config.http_timeout_seconds)).map_err(wrap)?;
        let consent = ConsentRedirector::new(provider.clone()).map_err(wrap)?;
        let callback = CallbackHandler::new(TokenExchanger::new(provider.clone(), http.clone()));
        let client = AuthorizedClient::new(&provider, http).map_err(wrap)?;

        let callback_path = callback_path(provider.redirect_uri())?;

        let duration_minutes = config.session.duration_minutes;
        let binder = SessionBinder::new(store, chrono::Duration::minutes(duration_minutes));

        Ok(Self {
            provider,
            consent,
            callback,
            binder,
            client,
            resource: Arc::new(config.resource.clone()),
            cookies: CookieSettings {
                secure: config.session.secure_cookies,
                session_max_age: time::Duration::minutes(duration_minutes),
            },
            callback_path: callback_path.into(),
            key: Key::derive_from(config.session.secret.expose_secret().as_bytes()),
        })
    }

    /// Returns the route that receives the provider redirect.
    #[must_use]
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Takes the route path from the registered redirect URI.
fn callback_path(redirect_uri: &str) -> Result<String, Report<StartupError>> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| StartupError::invalid_config("provider.redirect_uri", e.to_string()))?;
    let path = url.path();

    if RESERVED_PATHS.contains(&path) {
        return Err(StartupError::invalid_config(
            "provider.redirect_uri",
            format!("path '{path}' collides with a built-in route"),
        )
        .into());
    }
    Ok(path.to_string())
}
