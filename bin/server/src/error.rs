//! Domain error types for server operations.
//!
//! Flow failures from the libraries arrive as rootcause reports and are
//! mapped to HTTP statuses here. Detail that is safe to show goes into the
//! response body; everything else only reaches the log.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::Report;
use tokenbridge_oauth::OAuthError;
use tokenbridge_session::SessionError;

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded from the environment.
    LoadConfig { details: String },
    /// A configuration value is invalid.
    InvalidConfig { field: &'static str, reason: String },
    /// The listener could not be bound.
    Bind { addr: String, details: String },
    /// The server stopped with an I/O error.
    Serve { details: String },
}

impl StartupError {
    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadConfig { details } => write!(f, "failed to load configuration: {details}"),
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid configuration for '{field}': {reason}")
            }
            Self::Bind { addr, details } => write!(f, "failed to bind to {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// A request that could not complete the flow.
#[derive(Debug)]
pub enum FlowError {
    /// No session, or the session holds no token.
    NotAuthenticated,
    /// Consent, exchange, or downstream failure.
    OAuth(Report<OAuthError>),
    /// The session store failed.
    Session(Report<SessionError>),
}

impl From<Report<OAuthError>> for FlowError {
    fn from(report: Report<OAuthError>) -> Self {
        Self::OAuth(report)
    }
}

impl From<Report<SessionError>> for FlowError {
    fn from(report: Report<SessionError>) -> Self {
        Self::Session(report)
    }
}

impl FlowError {
    /// Returns the HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::OAuth(report) => match report.current_context() {
                OAuthError::MissingAuthorizationCode { .. } | OAuthError::StateMismatch { .. } => {
                    StatusCode::BAD_REQUEST
                }
                OAuthError::TokenExchange { .. }
                | OAuthError::TokenDecode { .. }
                | OAuthError::DownstreamRequest { .. } => StatusCode::BAD_GATEWAY,
                OAuthError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::NotAuthenticated => "Not signed in".to_string(),
            Self::OAuth(report) => {
                let context = report.current_context();
                if status.is_server_error() {
                    tracing::error!(
                        kind = context.kind(),
                        failed_at = %context.failed_at(),
                        "flow failed: {report}"
                    );
                } else {
                    tracing::warn!(
                        kind = context.kind(),
                        failed_at = %context.failed_at(),
                        "flow rejected: {context}"
                    );
                }
                match context {
                    OAuthError::Configuration { .. } => "Internal server error".to_string(),
                    _ => format!("Authentication failed: {context}"),
                }
            }
            Self::Session(report) => {
                tracing::error!("session store failed: {report}");
                "Internal server error".to_string()
            }
        };

        (status, message).into_response()
    }
}
