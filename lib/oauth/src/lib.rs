//! OAuth2 authorization code flow for tokenbridge.
//!
//! This crate provides:
//! - Provider configuration (`ProviderConfig`)
//! - Consent URL construction with per-flow CSRF state (`ConsentRedirector`)
//! - Callback validation for redirect and direct code input (`CallbackHandler`)
//! - Code-for-token exchange with provider-specific form fields (`TokenExchanger`)
//! - Bearer-authenticated downstream calls (`AuthorizedClient`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tokenbridge_oauth::{AuthorizationState, ConsentRedirector, ProviderConfig};
//!
//! let config = ProviderConfig::builder(
//!     "client-id",
//!     "client-secret",
//!     "https://login.salesforce.com/services/oauth2/authorize",
//!     "https://login.salesforce.com/services/oauth2/token",
//!     "https://app.example.com/auth/callback",
//! )
//! .build()
//! .expect("valid config");
//!
//! let redirector = ConsentRedirector::new(Arc::new(config)).expect("valid endpoints");
//! let state = AuthorizationState::new_random();
//! let url = redirector.build_consent_url(&state);
//!
//! assert!(url.as_str().contains("response_type=code"));
//! ```

pub mod callback;
pub mod consent;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod provider;
pub mod resource;
pub mod token;

pub use callback::{CallbackHandler, CallbackParams, CodeSource};
pub use consent::{AuthorizationState, ConsentRedirector};
pub use error::OAuthError;
pub use exchange::{TokenExchanger, http_client};
pub use flow::FlowStage;
pub use provider::{ProviderConfig, ProviderConfigBuilder};
pub use resource::{AuthorizedClient, AuthorizedRequest, RawResponse};
pub use token::{TokenResult, redact};
