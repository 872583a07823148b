//! Authorized downstream calls.
//!
//! The downstream API is opaque: we build the URL, attach the bearer token,
//! and hand back whatever came back, status included.

use std::fmt;

use tokenbridge_core::Result;
use tracing::instrument;
use url::Url;

use crate::error::OAuthError;
use crate::provider::ProviderConfig;
use crate::token::{TokenResult, redact};

/// One outbound call, ready to send.
#[derive(Clone)]
pub struct AuthorizedRequest {
    url: Url,
    method: reqwest::Method,
    access_token: String,
}

impl AuthorizedRequest {
    /// Returns the target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &reqwest::Method {
        &self.method
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for AuthorizedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedRequest")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

/// Downstream response, unmodified.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status returned by the resource server.
    pub status: reqwest::StatusCode,
    /// `Content-Type` returned by the resource server.
    pub content_type: Option<String>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// Issues bearer-authenticated requests against the resource server.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    api_base: Option<Url>,
}

impl AuthorizedClient {
    /// Creates a client; `api_base` comes from the provider configuration.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Configuration` if the configured API base is not a URL.
    pub fn new(config: &ProviderConfig, http: reqwest::Client) -> Result<Self, OAuthError> {
        let api_base = config
            .api_base()
            .map(Url::parse)
            .transpose()
            .map_err(|e| OAuthError::configuration("api_base", e.to_string()))?;
        Ok(Self { http, api_base })
    }

    /// Builds the request for `resource_path` on the token's instance.
    ///
    /// The token's `instance_url` wins over the configured API base.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::DownstreamRequest` if there is no access token,
    /// no base URL, or the joined URL does not parse.
    pub fn prepare(
        &self,
        token: &TokenResult,
        resource_path: &str,
        query: &[(String, String)],
    ) -> Result<AuthorizedRequest, OAuthError> {
        if token.access_token().trim().is_empty() {
            return Err(OAuthError::DownstreamRequest {
                details: "no access token to authorize the request".to_string(),
            }
            .into());
        }

        let base = match token.instance_url() {
            Some(instance_url) => instance_url.to_string(),
            None => self
                .api_base
                .as_ref()
                .map(Url::to_string)
                .ok_or_else(|| OAuthError::DownstreamRequest {
                    details: "token has no instance_url and no api_base is configured"
                        .to_string(),
                })?,
        };

        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            resource_path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| OAuthError::DownstreamRequest {
            details: format!("invalid resource URL '{joined}': {e}"),
        })?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(AuthorizedRequest {
            url,
            method: reqwest::Method::GET,
            access_token: token.access_token().to_string(),
        })
    }

    /// Calls `resource_path` with the token as a bearer credential.
    ///
    /// Non-2xx statuses are returned as-is; only transport failures are errors.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::DownstreamRequest` if the request cannot be built,
    /// sent, or its body read.
    #[instrument(skip(self, token, query), fields(resource_path = %resource_path))]
    pub async fn call_resource(
        &self,
        token: &TokenResult,
        resource_path: &str,
        query: &[(String, String)],
    ) -> Result<RawResponse, OAuthError> {
        let request = self.prepare(token, resource_path, query)?;
        self.send(&request).await
    }

    /// Sends a prepared request.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::DownstreamRequest` on transport failure.
    pub async fn send(&self, request: &AuthorizedRequest) -> Result<RawResponse, OAuthError> {
        tracing::debug!(url = %request.url, "issuing authorized request");

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(&request.access_token)
            .send()
            .await
            .map_err(|e| OAuthError::DownstreamRequest {
                details: e.without_url().to_string(),
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::DownstreamRequest {
                details: format!("failed to read response body: {}", e.without_url()),
            })?
            .to_vec();

        tracing::info!(
            status = status.as_u16(),
            body_len = body.len(),
            "authorized request completed"
        );

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(api_base: Option<&str>) -> AuthorizedClient {
        let mut builder = ProviderConfig::builder(
            "id",
            "secret",
            "https://login.example.com/authorize",
            "https://login.example.com/token",
            "https://app.example.com/cb",
        );
        if let Some(base) = api_base {
            builder = builder.api_base(base);
        }
        let config = builder.build().expect("valid config");
        let http = crate::exchange::http_client(Duration::from_secs(5)).expect("http client");
        AuthorizedClient::new(&config, http).expect("client")
    }

    fn soql() -> Vec<(String, String)> {
        vec![("q".to_string(), "select Id, name from account".to_string())]
    }

    #[test]
    fn instance_url_is_joined_with_path_and_query() {
        let token = TokenResult::bearer("AT1").with_instance_url("https://na1.example.com/");
        let request = client(None)
            .prepare(&token, "/services/data/v32.0/query", &soql())
            .expect("request");

        assert_eq!(
            request.url().as_str(),
            "https://na1.example.com/services/data/v32.0/query?q=select+Id%2C+name+from+account"
        );
        assert_eq!(request.method(), &reqwest::Method::GET);
        assert_eq!(request.authorization_header(), "Bearer AT1");
    }

    #[test]
    fn api_base_is_used_without_instance_url() {
        let request = client(Some("https://api.example.com"))
            .prepare(&TokenResult::bearer("AT1"), "v1/me", &[])
            .expect("request");
        assert_eq!(request.url().as_str(), "https://api.example.com/v1/me");
    }

    #[test]
    fn missing_base_is_a_downstream_error() {
        let err = client(None)
            .prepare(&TokenResult::bearer("AT1"), "/v1/me", &[])
            .expect_err("no base");
        assert!(matches!(
            err.current_context(),
            OAuthError::DownstreamRequest { .. }
        ));
    }

    #[test]
    fn empty_token_is_never_sent() {
        let token = TokenResult::bearer("").with_instance_url("https://na1.example.com");
        let err = client(None)
            .prepare(&token, "/v1/me", &[])
            .expect_err("empty token");
        assert!(matches!(
            err.current_context(),
            OAuthError::DownstreamRequest { .. }
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let token =
            TokenResult::bearer("super-secret-bearer").with_instance_url("https://na1.example.com");
        let request = client(None).prepare(&token, "/", &[]).expect("request");
        assert!(!format!("{request:?}").contains("super-secret-bearer"));
    }
}
