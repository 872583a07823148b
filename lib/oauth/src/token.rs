//! Token endpoint response decoding.
//!
//! Providers disagree on the shape of a token response: Salesforce sends
//! `instance_url`, `issued_at` (as a string) and `signature`; Google sends
//! `expires_in` and no instance URL. `TokenResult` accepts the union and
//! ignores anything else.

use std::fmt;

use rootcause::Report;
use serde::{Deserialize, Deserializer};

use crate::error::OAuthError;

/// Result of a successful code-for-token exchange.
///
/// Built once per exchange and never mutated afterwards.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResult {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    instance_url: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    issued_at: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default, rename = "id")]
    subject_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected seconds, got {n}"))),
        Some(StringOrNumber::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected seconds, got '{s}'"))),
    }
}

impl TokenResult {
    /// Decodes a token endpoint response body.
    ///
    /// Empty optional strings are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::TokenDecode` if the body is not JSON, a field has
    /// the wrong type, or `access_token` is missing or empty.
    pub fn from_json(body: &[u8]) -> Result<Self, Report<OAuthError>> {
        let mut token: Self = serde_json::from_slice(body).map_err(|e| OAuthError::TokenDecode {
            details: e.to_string(),
        })?;

        if token.access_token.trim().is_empty() {
            return Err(OAuthError::TokenDecode {
                details: "access_token is empty".to_string(),
            }
            .into());
        }

        for field in [
            &mut token.refresh_token,
            &mut token.instance_url,
            &mut token.scope,
            &mut token.issued_at,
            &mut token.id_token,
            &mut token.signature,
            &mut token.subject_id,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
        if token.token_type.is_empty() {
            token.token_type = default_token_type();
        }

        Ok(token)
    }

    /// Creates a bearer token result with no optional fields.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            instance_url: None,
            token_type: default_token_type(),
            scope: None,
            issued_at: None,
            id_token: None,
            signature: None,
            subject_id: None,
            expires_in: None,
        }
    }

    /// Sets the instance URL.
    #[must_use]
    pub fn with_instance_url(mut self, instance_url: impl Into<String>) -> Self {
        self.instance_url = Some(instance_url.into());
        self
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, present only when offline access was granted.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the provider-specific resource base URL.
    #[must_use]
    pub fn instance_url(&self) -> Option<&str> {
        self.instance_url.as_deref()
    }

    /// Returns the token type.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Returns the granted scope.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns the issue timestamp as sent by the provider.
    #[must_use]
    pub fn issued_at(&self) -> Option<&str> {
        self.issued_at.as_deref()
    }

    /// Returns the OpenID Connect ID token.
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Returns the provider's response signature.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Returns the identity URL or subject identifier (`id` on the wire).
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Returns the token lifetime in seconds.
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("instance_url", &self.instance_url)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("signature", &self.signature.as_ref().map(|_| "[REDACTED]"))
            .field("subject_id", &self.subject_id)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Shortens a credential to a hint that is safe to log.
#[must_use]
pub fn redact(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 8 {
        return "[REDACTED]".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}...({len} chars)")
}
