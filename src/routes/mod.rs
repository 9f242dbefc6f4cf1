//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module plays the host router. Page routes (public, protected and the
//! auth forms) run behind the navigation guard middleware; logout, the JSON
//! state endpoint and the health check do not.

pub mod auth;
pub mod pages;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::auth::NavigationRequest;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/", get(pages::home))
        .route("/blog", get(pages::blog))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/settings", get(pages::settings))
        .route("/admin", get(pages::admin))
        .route("/unauthorized", get(pages::unauthorized))
        .route("/auth/login", get(auth::login_page).post(auth::login_submit))
        .route("/auth/register", get(auth::register_page).post(auth::register_submit))
        .route("/auth/verify-email", get(auth::verify_email_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard));

    Router::new()
        .merge(guarded)
        .route("/auth/logout", post(auth::logout))
        .route("/api/auth/state", get(auth::state))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Navigation guard middleware. Redirects are `303 See Other`.
async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let decision = state.guard.evaluate(&NavigationRequest::new(uri.path(), uri.query())).await;
    match decision.location() {
        None => next.run(request).await,
        Some(location) => Redirect::to(location).into_response(),
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
