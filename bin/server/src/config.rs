//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`PROVIDER__CLIENT_ID`, `SESSION__SECRET`).
//!
//! See [`ProviderConfig`](tokenbridge_oauth::ProviderConfig) for the
//! provider settings.

use rootcause::Report;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokenbridge_oauth::ProviderConfig;

use crate::error::StartupError;

/// Minimum session secret length accepted for cookie signing.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub listen_port: u16,

    /// Identity provider configuration.
    pub provider: ProviderConfig,

    /// Session configuration.
    pub session: SessionConfig,

    /// Downstream resource called after sign-in.
    #[serde(default)]
    pub resource: ResourceConfig,

    /// Upper bound on each outbound HTTP request, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_http_timeout_seconds() -> u64 {
    30
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign session and auth state cookies.
    pub secret: SecretString,

    /// Session duration in minutes, renewed on every sign-in.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_session_duration_minutes() -> i64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl SessionConfig {
    /// Creates a session configuration with defaults for everything but the secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// The downstream call made once the token is bound.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Path appended to the token's instance URL.
    #[serde(default = "default_resource_path")]
    pub path: String,

    /// Form-encoded query string (`q=select Id, name from account`).
    #[serde(default = "default_resource_query")]
    pub query: String,
}

fn default_resource_path() -> String {
    "/services/data/v32.0/query".to_string()
}

fn default_resource_query() -> String {
    "q=select Id, name from account".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            path: default_resource_path(),
            query: default_resource_query(),
        }
    }
}

impl ResourceConfig {
    /// Returns the query string split into decoded name/value pairs.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .into_owned()
            .collect()
    }
}

impl ServerConfig {
    /// Creates a configuration with defaults for the optional sections.
    #[must_use]
    pub fn new(listen_port: u16, provider: ProviderConfig, session: SessionConfig) -> Self {
        Self {
            listen_port,
            provider,
            session,
            resource: ResourceConfig::default(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Checks the values that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::InvalidConfig` for the first offending setting.
    pub fn validate(&self) -> Result<(), Report<StartupError>> {
        self.provider
            .validate()
            .map_err(|report| report.context(StartupError::invalid_config("provider", "invalid provider settings")))?;

        if self.session.secret.expose_secret().len() < MIN_SESSION_SECRET_BYTES {
            return Err(StartupError::invalid_config(
                "session.secret",
                format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes"),
            )
            .into());
        }
        if self.session.duration_minutes <= 0 {
            return Err(StartupError::invalid_config("session.duration_minutes", "must be positive").into());
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(
                StartupError::invalid_config("session.cleanup_interval_seconds", "must be positive").into(),
            );
        }
        if self.http_timeout_seconds == 0 {
            return Err(StartupError::invalid_config("http_timeout_seconds", "must be positive").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig::builder(
            "client",
            "secret",
            "https://login.example.com/services/oauth2/authorize",
            "https://login.example.com/services/oauth2/token",
            "https://app.example.com/auth/callback",
        )
        .build()
        .expect("valid provider")
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::new("x".repeat(32));
        assert_eq!(config.duration_minutes, 60);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert!(config.secure_cookies);
    }

    #[test]
    fn resource_query_is_form_decoded() {
        let resource = ResourceConfig::default();
        assert_eq!(
            resource.query_pairs(),
            vec![("q".to_string(), "select Id, name from account".to_string())]
        );
    }

    #[test]
    fn short_session_secret_is_rejected() {
        let config = ServerConfig::new(8080, provider(), SessionConfig::new("too-short"));
        let err = config.validate().expect_err("short secret");
        assert!(matches!(
            err.current_context(),
            StartupError::InvalidConfig { field: "session.secret", .. }
        ));
    }

    #[test]
    fn valid_config_passes() {
        let config = ServerConfig::new(8080, provider(), SessionConfig::new("k".repeat(48)));
        config.validate().expect("valid");
    }

    #[test]
    fn config_deserializes_nested_sections() {
        let json = r#"{
            "listen_port": 5000,
            "provider": {
                "client_id": "C1",
                "client_secret": "S1",
                "authorization_endpoint": "https://login.example.com/authorize",
                "token_endpoint": "https://login.example.com/token",
                "redirect_uri": "https://app.example.com/auth/callback"
            },
            "session": { "secret": "0123456789abcdef0123456789abcdef" }
        }"#;

        let config: ServerConfig = serde_json::from_str(json).expect("deserialize");
        config.validate().expect("valid");
        assert_eq!(config.listen_port, 5000);
        assert_eq!(config.http_timeout_seconds, 30);
        assert_eq!(config.resource.path, "/services/data/v32.0/query");
    }
}
