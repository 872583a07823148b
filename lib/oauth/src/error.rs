//! Error types for the oauth crate.
//!
//! Operations return `Report<OAuthError>`; callers add context with
//! rootcause as the error moves up to the HTTP or CLI layer. Variants never
//! carry the client secret or token values.

use std::fmt;

use crate::flow::FlowStage;

/// Failures of the authorization code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Provider configuration is missing or malformed. Fatal at startup.
    Configuration { field: &'static str, reason: String },
    /// The callback carried no authorization code.
    MissingAuthorizationCode { provider_error: Option<String> },
    /// The callback state did not match the pending flow.
    StateMismatch { reason: String },
    /// The token endpoint could not be reached or answered with an error status.
    TokenExchange { status: Option<u16>, details: String },
    /// The token endpoint answered with a body that is not a usable token.
    TokenDecode { details: String },
    /// The authorized downstream call could not be made.
    DownstreamRequest { details: String },
}

impl OAuthError {
    /// Creates a configuration error for the named field.
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Returns the last stage the flow reached before this failure.
    #[must_use]
    pub fn failed_at(&self) -> FlowStage {
        match self {
            Self::Configuration { .. } => FlowStage::Unauthenticated,
            Self::MissingAuthorizationCode { .. } | Self::StateMismatch { .. } => {
                FlowStage::ConsentIssued
            }
            Self::TokenExchange { .. } | Self::TokenDecode { .. } => FlowStage::CodeReceived,
            Self::DownstreamRequest { .. } => FlowStage::SessionBound,
        }
    }

    /// Returns a stable name for the failure kind, used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::MissingAuthorizationCode { .. } => "missing_authorization_code",
            Self::StateMismatch { .. } => "state_mismatch",
            Self::TokenExchange { .. } => "token_exchange",
            Self::TokenDecode { .. } => "token_decode",
            Self::DownstreamRequest { .. } => "downstream_request",
        }
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { field, reason } => {
                write!(f, "invalid provider configuration for '{field}': {reason}")
            }
            Self::MissingAuthorizationCode { provider_error } => match provider_error {
                Some(err) => write!(f, "callback carried no authorization code: {err}"),
                None => write!(f, "callback carried no authorization code"),
            },
            Self::StateMismatch { reason } => {
                write!(f, "authorization state mismatch: {reason}")
            }
            Self::TokenExchange {
                status: Some(status),
                details,
            } => {
                write!(f, "token exchange failed with status {status}: {details}")
            }
            Self::TokenExchange {
                status: None,
                details,
            } => {
                write!(f, "token exchange failed: {details}")
            }
            Self::TokenDecode { details } => {
                write!(f, "token response could not be decoded: {details}")
            }
            Self::DownstreamRequest { details } => {
                write!(f, "downstream request failed: {details}")
            }
        }
    }
}

impl std::error::Error for OAuthError {}
