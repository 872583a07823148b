//! HTTP front end for the tokenbridge authorization code flow.
//!
//! `GET /login` sends the user agent to the provider, the redirect URI's
//! path receives the code, and `GET /resource` repeats the downstream call
//! for a signed-in session.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the router; the callback route is taken from the redirect URI.
pub fn app(state: AppState) -> Router {
    let callback_path = state.callback_path().to_string();

    Router::new()
        .route("/", get(routes::index))
        .route("/login", get(routes::login))
        .route(&callback_path, get(routes::callback))
        .route("/resource", get(routes::resource))
        .route("/config", get(routes::config_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
