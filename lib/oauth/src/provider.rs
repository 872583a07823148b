//! Identity provider configuration.
//!
//! A `ProviderConfig` describes one OAuth2 provider: its endpoints, the
//! client credentials registered with it, the redirect target, and the
//! scopes to request. It is loaded once at startup and shared read-only by
//! every flow. Call [`ProviderConfig::validate`] before serving requests; a
//! config that fails validation must abort startup.

use std::collections::BTreeMap;

use tokenbridge_core::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::error::OAuthError;

/// Configuration for the OAuth2 identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: SecretString,
    /// The provider's consent page (e.g., "https://login.salesforce.com/services/oauth2/authorize").
    authorization_endpoint: String,
    /// The provider's token endpoint.
    token_endpoint: String,
    /// The redirect URI registered with the provider.
    redirect_uri: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "full,refresh_token"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Fixed resource host for providers that return no `instance_url`.
    #[serde(default)]
    api_base: Option<String>,
    /// `name=value` pair asking the provider for a refresh token.
    /// Default: "access_type=offline". Empty disables it.
    #[serde(default = "default_offline_access_param")]
    offline_access_param: String,
    /// Extra query parameters appended to the consent URL.
    #[serde(default)]
    extra_consent_params: BTreeMap<String, String>,
    /// Extra form fields appended to the token exchange body.
    #[serde(default)]
    extra_token_params: BTreeMap<String, String>,
}

fn default_scopes() -> String {
    "full,refresh_token".to_string()
}

fn default_offline_access_param() -> String {
    "access_type=offline".to_string()
}

impl ProviderConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(
            client_id,
            client_secret,
            authorization_endpoint,
            token_endpoint,
            redirect_uri,
        )
    }

    /// Checks that every required field is present and every URL is absolute.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<(), OAuthError> {
        require_non_empty("client_id", &self.client_id)?;
        require_non_empty("client_secret", self.client_secret.expose_secret())?;
        require_absolute_url("authorization_endpoint", &self.authorization_endpoint)?;
        require_absolute_url("token_endpoint", &self.token_endpoint)?;
        require_absolute_url("redirect_uri", &self.redirect_uri)?;

        if self.scopes().is_empty() {
            return Err(OAuthError::configuration("scopes", "at least one scope is required").into());
        }

        if let Some(api_base) = &self.api_base {
            require_absolute_url("api_base", api_base)?;
        }

        if !self.offline_access_param.is_empty() && self.offline_access().is_none() {
            return Err(OAuthError::configuration(
                "offline_access_param",
                format!("expected name=value, got '{}'", self.offline_access_param),
            )
            .into());
        }

        Ok(())
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    /// Returns the authorization endpoint URL.
    #[must_use]
    pub fn authorization_endpoint(&self) -> &str {
        &self.authorization_endpoint
    }

    /// Returns the token endpoint URL.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Returns the redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the fixed API base, if configured.
    #[must_use]
    pub fn api_base(&self) -> Option<&str> {
        self.api_base.as_deref()
    }

    /// Returns the offline access parameter split into name and value.
    #[must_use]
    pub fn offline_access(&self) -> Option<(&str, &str)> {
        self.offline_access_param
            .split_once('=')
            .filter(|(name, value)| !name.is_empty() && !value.is_empty())
    }

    /// Returns extra consent URL parameters.
    #[must_use]
    pub fn extra_consent_params(&self) -> &BTreeMap<String, String> {
        &self.extra_consent_params
    }

    /// Returns extra token exchange form fields.
    #[must_use]
    pub fn extra_token_params(&self) -> &BTreeMap<String, String> {
        &self.extra_token_params
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), OAuthError> {
    if value.trim().is_empty() {
        return Err(OAuthError::configuration(field, "must not be empty").into());
    }
    Ok(())
}

fn require_absolute_url(field: &'static str, value: &str) -> Result<(), OAuthError> {
    require_non_empty(field, value)?;
    let url = Url::parse(value).map_err(|e| OAuthError::configuration(field, e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(OAuthError::configuration(field, "must be an absolute http(s) URL").into());
    }
    Ok(())
}

/// Builder for `ProviderConfig`.
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
    scopes: Vec<String>,
}

impl ProviderConfigBuilder {
    /// Creates a new builder with the required fields.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let config = ProviderConfig {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            redirect_uri: redirect_uri.into(),
            scopes: default_scopes(),
            api_base: None,
            offline_access_param: default_offline_access_param(),
            extra_consent_params: BTreeMap::new(),
            extra_token_params: BTreeMap::new(),
        };
        let scopes = config.scopes().into_iter().map(str::to_string).collect();
        Self { config, scopes }
    }

    /// Replaces the scopes to request.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Adds a scope unless it is already present.
    #[must_use]
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Sets the fixed API base used when the token carries no instance URL.
    #[must_use]
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.config.api_base = Some(api_base.into());
        self
    }

    /// Sets the offline access `name=value` pair; empty disables it.
    #[must_use]
    pub fn offline_access_param(mut self, param: impl Into<String>) -> Self {
        self.config.offline_access_param = param.into();
        self
    }

    /// Adds an extra consent URL parameter.
    #[must_use]
    pub fn extra_consent_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .extra_consent_params
            .insert(name.into(), value.into());
        self
    }

    /// Adds an extra token exchange form field.
    #[must_use]
    pub fn extra_token_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .extra_token_params
            .insert(name.into(), value.into());
        self
    }

    /// Builds and validates the `ProviderConfig`.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Configuration` if validation fails.
    pub fn build(mut self) -> Result<ProviderConfig, OAuthError> {
        self.config.scopes = self.scopes.join(",");
        self.config.validate()?;
        Ok(self.config)
    }
}
