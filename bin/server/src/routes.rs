//! Flow routes: sign-in start, provider callback, and authorized reads.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use time::Duration as TimeDuration;
use tokenbridge_core::FlowId;
use tokenbridge_oauth::{AuthorizationState, CallbackParams, CodeSource, FlowStage, RawResponse};
use tokenbridge_session::SessionId;
use tracing::instrument;

use crate::error::FlowError;
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "tokenbridge_session";

/// Auth state cookie name (CSRF protection between consent and callback).
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Lifetime of a pending consent.
const AUTH_STATE_MAX_AGE: TimeDuration = TimeDuration::minutes(10);

/// Renders a sign-in link and remembers the flow state.
pub async fn index(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    let (url, auth_state) = state.consent.begin();
    let page = format!(
        "<!DOCTYPE html>\n<html><body><a href=\"{}\">Sign in</a></body></html>\n",
        escape_attribute(url.as_str())
    );
    (jar.add(auth_state_cookie(&state, &auth_state)), Html(page))
}

/// Redirects the user agent straight to the provider's consent page.
pub async fn login(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    let (url, auth_state) = state.consent.begin();
    tracing::info!(stage = %FlowStage::ConsentIssued, "redirecting to consent page");
    (
        jar.add(auth_state_cookie(&state, &auth_state)),
        Redirect::to(url.as_str()),
    )
}

/// Handles the provider redirect: verifies state, exchanges the code,
/// binds the token, and answers with the downstream resource.
///
/// The pending state is single-use: every response clears the
/// `auth_state` cookie, whatever the outcome.
#[instrument(skip_all, fields(flow_id = %FlowId::new()))]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: SignedCookieJar,
) -> Response {
    let expected_state = jar
        .get(AUTH_STATE_COOKIE)
        .map(|cookie| AuthorizationState::from_value(cookie.value()));
    let existing_session = session_id(&jar);
    let jar = jar.remove(Cookie::build(AUTH_STATE_COOKIE).path("/"));

    let token = match state
        .callback
        .handle_callback(CodeSource::Callback {
            params: &params,
            expected_state: expected_state.as_ref(),
        })
        .await
    {
        Ok(token) => token,
        Err(report) => return (jar, FlowError::from(report)).into_response(),
    };
    tracing::info!(stage = %FlowStage::TokenExchanged, "authorization code exchanged");

    let session = match state.binder.bind_token(existing_session, &token).await {
        Ok(session) => session,
        Err(report) => return (jar, FlowError::from(report)).into_response(),
    };
    tracing::info!(stage = %FlowStage::SessionBound, session_id = %session.id(), "token bound");

    // The session is bound either way; the cookie goes out with the error too.
    let jar = jar.add(session_cookie(&state, session.id()));
    let resource = state
        .client
        .call_resource(&token, &state.resource.path, &state.resource.query_pairs())
        .await;
    match resource {
        Ok(raw) => {
            tracing::info!(stage = %FlowStage::AuthorizedCallIssued, status = raw.status.as_u16(), "flow complete");
            (jar, raw_response(raw)).into_response()
        }
        Err(report) => (jar, FlowError::from(report)).into_response(),
    }
}

/// Calls the downstream resource with the token bound to this session.
pub async fn resource(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Response, FlowError> {
    let id = session_id(&jar).ok_or(FlowError::NotAuthenticated)?;
    let token = state
        .binder
        .bound_token(id)
        .await?
        .ok_or(FlowError::NotAuthenticated)?;

    let raw = state
        .client
        .call_resource(&token, &state.resource.path, &state.resource.query_pairs())
        .await?;
    Ok(raw_response(raw))
}

/// Shows the non-secret provider configuration.
pub async fn config_page(State(state): State<AppState>) -> String {
    let provider = &state.provider;
    format!(
        "Current Configuration:\n\
         Client ID: {}\n\
         Authentication URL: {}\n\
         Token URL: {}\n\
         Redirect URL: {}\n\
         Scopes: {}\n\
         Resource: {}\n",
        provider.client_id(),
        provider.authorization_endpoint(),
        provider.token_endpoint(),
        provider.redirect_uri(),
        provider.scopes().join(" "),
        state.resource.path,
    )
}

fn auth_state_cookie(state: &AppState, auth_state: &AuthorizationState) -> Cookie<'static> {
    Cookie::build((AUTH_STATE_COOKIE, auth_state.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.cookies.secure)
        .same_site(SameSite::Lax)
        .max_age(AUTH_STATE_MAX_AGE)
        .build()
}

fn session_cookie(state: &AppState, id: SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.cookies.secure)
        .same_site(SameSite::Lax)
        .max_age(state.cookies.session_max_age)
        .build()
}

/// Reads the session ID from the signed cookie; tampered or malformed values read as none.
fn session_id(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse().ok())
}

fn raw_response(raw: RawResponse) -> Response {
    let mut response = (raw.status, raw.body).into_response();
    if let Some(content_type) = raw
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
    {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_escaping_covers_query_separators() {
        assert_eq!(
            escape_attribute("https://x/a?b=1&c=\"2\""),
            "https://x/a?b=1&amp;c=&quot;2&quot;"
        );
    }

    #[test]
    fn raw_response_keeps_status_and_content_type() {
        let response = raw_response(RawResponse {
            status: axum::http::StatusCode::UNAUTHORIZED,
            content_type: Some("application/json".to_string()),
            body: br#"[{"errorCode":"INVALID_SESSION_ID"}]"#.to_vec(),
        });
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }
}
