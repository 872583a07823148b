//! Provider callback handling.
//!
//! The authorization code can reach us two ways: through the provider's
//! redirect to our callback URL, or typed in by an operator who completed
//! consent elsewhere. Both feed the same exchanger.

use tokenbridge_core::Result;
use serde::Deserialize;

use crate::consent::AuthorizationState;
use crate::error::OAuthError;
use crate::exchange::TokenExchanger;
use crate::token::TokenResult;

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    #[serde(default)]
    pub code: Option<String>,
    /// Echoed CSRF state.
    #[serde(default)]
    pub state: Option<String>,
    /// Error code when the user or provider refused consent.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable detail for `error`.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    fn provider_error(&self) -> Option<String> {
        let error = self.error.as_deref().filter(|e| !e.is_empty())?;
        Some(match self.error_description.as_deref() {
            Some(description) if !description.is_empty() => format!("{error}: {description}"),
            _ => error.to_string(),
        })
    }
}

/// Where an authorization code comes from.
#[derive(Debug, Clone, Copy)]
pub enum CodeSource<'a> {
    /// The provider redirected the user agent back to us.
    Callback {
        params: &'a CallbackParams,
        /// State stored when the flow began; `None` if none was found.
        expected_state: Option<&'a AuthorizationState>,
    },
    /// The code was supplied directly, with no redirect to verify.
    Direct(&'a str),
}

impl<'a> CodeSource<'a> {
    /// Extracts the authorization code, verifying callback state.
    ///
    /// The code is checked before the state, so a callback without a code
    /// always reports `MissingAuthorizationCode`.
    ///
    /// # Errors
    ///
    /// - `OAuthError::MissingAuthorizationCode` if the code is absent or empty
    /// - `OAuthError::StateMismatch` if the echoed state is absent or differs
    pub fn authorization_code(&self) -> Result<&'a str, OAuthError> {
        match *self {
            Self::Direct(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(OAuthError::MissingAuthorizationCode {
                        provider_error: None,
                    }
                    .into());
                }
                Ok(code)
            }
            Self::Callback {
                params,
                expected_state,
            } => {
                let code = params
                    .code
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| OAuthError::MissingAuthorizationCode {
                        provider_error: params.provider_error(),
                    })?;

                let expected = expected_state.ok_or_else(|| OAuthError::StateMismatch {
                    reason: "no pending flow for this user agent".to_string(),
                })?;
                let echoed = params
                    .state
                    .as_deref()
                    .ok_or_else(|| OAuthError::StateMismatch {
                        reason: "callback carried no state".to_string(),
                    })?;
                if !expected.matches(echoed) {
                    return Err(OAuthError::StateMismatch {
                        reason: "callback state differs from the pending flow".to_string(),
                    }
                    .into());
                }

                Ok(code)
            }
        }
    }
}

/// Turns a provider callback (or a directly supplied code) into a token.
#[derive(Debug, Clone)]
pub struct CallbackHandler {
    exchanger: TokenExchanger,
}

impl CallbackHandler {
    /// Creates a handler that exchanges codes with `exchanger`.
    #[must_use]
    pub fn new(exchanger: TokenExchanger) -> Self {
        Self { exchanger }
    }

    /// Validates the code source and exchanges the code.
    ///
    /// No network call is made unless the code and state are valid.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from [`CodeSource::authorization_code`]
    /// and exchange errors from [`TokenExchanger::exchange`].
    pub async fn handle_callback(
        &self,
        source: CodeSource<'_>,
    ) -> Result<TokenResult, OAuthError> {
        let code = source.authorization_code()?;
        tracing::debug!(code_len = code.len(), "received authorization code");
        self.exchanger.exchange(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..CallbackParams::default()
        }
    }

    fn expect_error(source: CodeSource<'_>) -> OAuthError {
        source
            .authorization_code()
            .expect_err("should fail")
            .current_context()
            .clone()
    }

    #[test]
    fn valid_callback_yields_code() {
        let state = AuthorizationState::from_value("s1");
        let params = params(Some("abc"), Some("s1"));
        let source = CodeSource::Callback {
            params: &params,
            expected_state: Some(&state),
        };
        assert_eq!(source.authorization_code().expect("code"), "abc");
    }

    #[test]
    fn missing_code_is_reported_before_state() {
        let params = params(None, None);
        let err = expect_error(CodeSource::Callback {
            params: &params,
            expected_state: None,
        });
        assert!(matches!(err, OAuthError::MissingAuthorizationCode { .. }));
    }

    #[test]
    fn provider_denial_is_carried_in_missing_code() {
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("end-user denied authorization".to_string()),
            ..CallbackParams::default()
        };
        let err = expect_error(CodeSource::Callback {
            params: &params,
            expected_state: None,
        });
        assert_eq!(
            err,
            OAuthError::MissingAuthorizationCode {
                provider_error: Some("access_denied: end-user denied authorization".to_string()),
            }
        );
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let state = AuthorizationState::from_value("expected");
        let params = params(Some("abc"), Some("forged"));
        let err = expect_error(CodeSource::Callback {
            params: &params,
            expected_state: Some(&state),
        });
        assert!(matches!(err, OAuthError::StateMismatch { .. }));
    }

    #[test]
    fn absent_state_is_rejected() {
        let state = AuthorizationState::from_value("expected");
        let params = params(Some("abc"), None);
        let err = expect_error(CodeSource::Callback {
            params: &params,
            expected_state: Some(&state),
        });
        assert!(matches!(err, OAuthError::StateMismatch { .. }));
    }

    #[test]
    fn callback_without_pending_flow_is_rejected() {
        let params = params(Some("abc"), Some("s1"));
        let err = expect_error(CodeSource::Callback {
            params: &params,
            expected_state: None,
        });
        assert!(matches!(err, OAuthError::StateMismatch { .. }));
    }

    #[test]
    fn direct_code_is_trimmed() {
        assert_eq!(
            CodeSource::Direct("  abc\n").authorization_code().expect("code"),
            "abc"
        );
        let err = expect_error(CodeSource::Direct("   "));
        assert!(matches!(err, OAuthError::MissingAuthorizationCode { .. }));
    }
}
