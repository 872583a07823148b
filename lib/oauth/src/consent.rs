//! Consent redirect construction.
//!
//! The consent URL sends the user agent to the provider's authorization
//! endpoint. Each flow gets its own unpredictable `state` value, which the
//! caller must keep (signed, server-side or in a cookie) and hand back to
//! the callback handler for comparison.

use std::sync::Arc;

use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope, basic::BasicClient};
use tokenbridge_core::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OAuthError;
use crate::provider::ProviderConfig;

/// CSRF state for one pending consent flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationState(String);

impl AuthorizationState {
    /// Generates a fresh random state value.
    #[must_use]
    pub fn new_random() -> Self {
        Self(CsrfToken::new_random().secret().clone())
    }

    /// Wraps a state value read back from storage.
    #[must_use]
    pub fn from_value(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the state value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the echoed callback value matches this state.
    #[must_use]
    pub fn matches(&self, echoed: &str) -> bool {
        !self.0.is_empty() && self.0 == echoed
    }
}

/// Builds authorization request URLs for the configured provider.
#[derive(Debug, Clone)]
pub struct ConsentRedirector {
    config: Arc<ProviderConfig>,
    auth_url: AuthUrl,
    redirect_url: RedirectUrl,
}

impl ConsentRedirector {
    /// Creates a redirector, parsing the configured endpoints once.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Configuration` if an endpoint is not a valid URL.
    pub fn new(config: Arc<ProviderConfig>) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(config.authorization_endpoint().to_string())
            .map_err(|e| OAuthError::configuration("authorization_endpoint", e.to_string()))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| OAuthError::configuration("redirect_uri", e.to_string()))?;

        Ok(Self {
            config,
            auth_url,
            redirect_url,
        })
    }

    /// Starts a new flow: generates its state and the matching consent URL.
    #[must_use]
    pub fn begin(&self) -> (Url, AuthorizationState) {
        let state = AuthorizationState::new_random();
        let url = self.build_consent_url(&state);
        tracing::debug!(
            authorization_endpoint = self.config.authorization_endpoint(),
            "built consent URL"
        );
        (url, state)
    }

    /// Builds the consent URL for the given flow state.
    ///
    /// The URL carries `response_type=code`, `client_id`, `redirect_uri`,
    /// the space-delimited `scope`, `state`, the offline access flag, and
    /// any extra consent parameters.
    #[must_use]
    pub fn build_consent_url(&self, state: &AuthorizationState) -> Url {
        let client = BasicClient::new(ClientId::new(self.config.client_id().to_string()))
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let csrf = CsrfToken::new(state.as_str().to_string());
        let mut auth_request = client.authorize_url(|| csrf);

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        // Request offline access for refresh token
        if let Some((name, value)) = self.config.offline_access() {
            auth_request = auth_request.add_extra_param(name, value);
        }

        for (name, value) in self.config.extra_consent_params() {
            auth_request = auth_request.add_extra_param(name.as_str(), value.as_str());
        }

        let (url, _) = auth_request.url();
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn redirector(config: ProviderConfig) -> ConsentRedirector {
        ConsentRedirector::new(Arc::new(config)).expect("valid redirector")
    }

    fn query_of(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn consent_url_carries_required_parameters() {
        let config = ProviderConfig::builder(
            "C1",
            "S1",
            "https://login.example.com/services/oauth2/authorize",
            "https://login.example.com/services/oauth2/token",
            "https://x/cb",
        )
        .scopes(vec!["full".to_string()])
        .build()
        .expect("valid config");

        let state = AuthorizationState::from_value("st-1");
        let url = redirector(config).build_consent_url(&state);
        let raw = url.as_str();

        assert!(raw.starts_with("https://login.example.com/services/oauth2/authorize?"));
        assert!(raw.contains("client_id=C1"));
        assert!(raw.contains("redirect_uri=https%3A%2F%2Fx%2Fcb"));
        assert!(raw.contains("response_type=code"));

        let query = query_of(&url);
        assert_eq!(query.get("state").map(String::as_str), Some("st-1"));
        assert_eq!(query.get("scope").map(String::as_str), Some("full"));
        assert_eq!(query.get("access_type").map(String::as_str), Some("offline"));
    }

    #[test]
    fn scopes_are_space_delimited() {
        let config = ProviderConfig::builder(
            "C1",
            "S1",
            "https://login.example.com/authorize",
            "https://login.example.com/token",
            "https://app.example.com/cb",
        )
        .build()
        .expect("valid config");

        let url = redirector(config).build_consent_url(&AuthorizationState::new_random());
        assert_eq!(
            query_of(&url).get("scope").map(String::as_str),
            Some("full refresh_token")
        );
    }

    #[test]
    fn extra_consent_params_are_appended() {
        let config = ProviderConfig::builder(
            "C1",
            "S1",
            "https://accounts.example.com/o/oauth2/v2/auth",
            "https://oauth2.example.com/token",
            "https://app.example.com/cb",
        )
        .extra_consent_param("prompt", "consent")
        .build()
        .expect("valid config");

        let url = redirector(config).build_consent_url(&AuthorizationState::new_random());
        assert_eq!(
            query_of(&url).get("prompt").map(String::as_str),
            Some("consent")
        );
    }

    #[test]
    fn each_flow_gets_a_fresh_state() {
        let config = ProviderConfig::builder(
            "C1",
            "S1",
            "https://login.example.com/authorize",
            "https://login.example.com/token",
            "https://app.example.com/cb",
        )
        .build()
        .expect("valid config");
        let redirector = redirector(config);

        let (first_url, first) = redirector.begin();
        let (_, second) = redirector.begin();

        assert_ne!(first, second);
        assert!(!first.as_str().is_empty());
        assert_eq!(
            query_of(&first_url).get("state").map(String::as_str),
            Some(first.as_str())
        );
    }

    #[test]
    fn state_matching_is_exact() {
        let state = AuthorizationState::from_value("abc");
        assert!(state.matches("abc"));
        assert!(!state.matches("abd"));
        assert!(!AuthorizationState::from_value("").matches(""));
    }
}
