//! Authorization code exchange.
//!
//! The token request body is built by hand instead of through `oauth2`'s
//! `exchange_code`, so that providers needing extra grant parameters can be
//! served from configuration alone.

use std::sync::Arc;
use std::time::Duration;

use tokenbridge_core::Result;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use crate::error::OAuthError;
use crate::provider::ProviderConfig;
use crate::token::{TokenResult, redact};

/// Longest provider error body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Builds the HTTP client shared by the exchanger and the authorized client.
///
/// Redirects are not followed and every request is bounded by `timeout`.
///
/// # Errors
///
/// Returns `OAuthError::Configuration` if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, OAuthError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| OAuthError::configuration("http_client", e.to_string()))?;
    Ok(client)
}

/// Standard OAuth2 error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges authorization codes at the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    config: Arc<ProviderConfig>,
    http: reqwest::Client,
}

impl TokenExchanger {
    /// Creates an exchanger that sends requests through `http`.
    #[must_use]
    pub fn new(config: Arc<ProviderConfig>, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Returns the form fields sent for `code`, in wire order.
    #[must_use]
    pub fn form_fields<'a>(&'a self, code: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut fields = vec![
            ("code", code),
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret().expose_secret().as_str()),
            ("redirect_uri", self.config.redirect_uri()),
        ];
        fields.extend(
            self.config
                .extra_token_params()
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        fields
    }

    /// Exchanges an authorization code for a token.
    ///
    /// Sends exactly one form-encoded POST. The code is single-use, so the
    /// request is never retried.
    ///
    /// # Errors
    ///
    /// - `OAuthError::TokenExchange` on transport failure or a non-2xx status
    /// - `OAuthError::TokenDecode` if the body is not a usable token
    #[instrument(skip(self, code), fields(token_endpoint = %self.config.token_endpoint()))]
    pub async fn exchange(&self, code: &str) -> Result<TokenResult, OAuthError> {
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&self.form_fields(code))
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchange {
                status: None,
                details: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::TokenExchange {
                status: Some(status.as_u16()),
                details: format!("failed to read response body: {}", e.without_url()),
            })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint rejected exchange");
            return Err(OAuthError::TokenExchange {
                status: Some(status.as_u16()),
                details: describe_error_body(&body),
            }
            .into());
        }

        let token = TokenResult::from_json(&body)?;

        tracing::info!(
            access_token = %redact(token.access_token()),
            has_refresh_token = token.refresh_token().is_some(),
            instance_url = token.instance_url().unwrap_or("-"),
            "exchanged authorization code"
        );

        Ok(token)
    }
}

fn describe_error_body(body: &[u8]) -> String {
    if let Ok(err) = serde_json::from_slice::<ProviderErrorBody>(body) {
        return match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        };
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
