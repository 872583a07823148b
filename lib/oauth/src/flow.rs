//! Stages of a single consent flow.
//!
//! A flow moves strictly forward through these stages. Any stage can end in
//! failure; the error reports the last stage the flow reached.

use std::fmt;

/// How far a flow has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlowStage {
    /// No consent requested yet.
    Unauthenticated,
    /// The consent URL was handed to the user agent.
    ConsentIssued,
    /// The provider redirected back with an authorization code.
    CodeReceived,
    /// The code was exchanged for a decoded token.
    TokenExchanged,
    /// The access token was written to the session.
    SessionBound,
    /// A downstream call was made with the bound token.
    AuthorizedCallIssued,
}

impl FlowStage {
    /// Returns the stage name used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::ConsentIssued => "consent_issued",
            Self::CodeReceived => "code_received",
            Self::TokenExchanged => "token_exchanged",
            Self::SessionBound => "session_bound",
            Self::AuthorizedCallIssued => "authorized_call_issued",
        }
    }

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Unauthenticated => Some(Self::ConsentIssued),
            Self::ConsentIssued => Some(Self::CodeReceived),
            Self::CodeReceived => Some(Self::TokenExchanged),
            Self::TokenExchanged => Some(Self::SessionBound),
            Self::SessionBound => Some(Self::AuthorizedCallIssued),
            Self::AuthorizedCallIssued => None,
        }
    }

    /// Returns true once the flow has nothing left to do.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = FlowStage::Unauthenticated;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(stage, FlowStage::AuthorizedCallIssued);
        assert!(stage.is_terminal());
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(FlowStage::TokenExchanged.to_string(), "token_exchanged");
    }
}
