//! Auth routes: login, logout and register forms plus the state endpoint.

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::Form;
use serde::{Deserialize, Serialize};

use crate::auth::redirect::{REDIRECT_PARAM, redirect_param, sanitize_redirect};
use crate::auth::{AuthPhase, AuthState, LoginError, LogoutOutcome, RegisterOutcome};
use crate::routes::pages::{escape, layout};
use crate::state::AppState;

fn error_status(err: &LoginError) -> StatusCode {
    match err {
        LoginError::MissingFields | LoginError::PasswordMismatch | LoginError::WeakPassword => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LoginError::Service(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_block(error: Option<&str>) -> String {
    error.map_or_else(String::new, |e| format!(r#"<p class="error" role="alert">{}</p>"#, escape(e)))
}

fn redirect_field(redirect_to: Option<&str>) -> String {
    redirect_to.map_or_else(String::new, |raw| {
        format!(r#"<input type="hidden" name="{REDIRECT_PARAM}" value="{}">"#, escape(raw))
    })
}

// =============================================================================
// LOGIN
// =============================================================================

// No Debug: carries the password.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

fn login_form(email: &str, redirect_to: Option<&str>, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{error}<form method="post" action="/auth/login">{redirect}<label>Email <input type="email" name="email" value="{email}"></label><label>Password <input type="password" name="password"></label><button type="submit">Sign in</button></form><p><a href="/auth/register">Create an account</a></p>"#,
        error = error_block(error),
        redirect = redirect_field(redirect_to),
        email = escape(email),
    );
    layout("Sign in", None, "/auth/login", &body)
}

/// `GET /auth/login`: render the form, carrying `redirectTo` through.
pub async fn login_page(State(state): State<AppState>, RawQuery(query): RawQuery) -> Html<String> {
    let error = state.store.snapshot().error;
    login_form("", redirect_param(query.as_deref()), error.as_deref())
}

/// `POST /auth/login`: sign in, then redirect or re-render with the error.
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.orchestrator.login(&form.email, &form.password, form.redirect_to.as_deref()).await {
        Ok(success) => Redirect::to(&success.redirect).into_response(),
        Err(err) => {
            let message = err.to_string();
            let page = login_form(form.email.trim(), form.redirect_to.as_deref(), Some(&message));
            (error_status(&err), page).into_response()
        }
    }
}

// =============================================================================
// LOGOUT
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    from: Option<String>,
}

/// `POST /auth/logout`: sign out from the page named in `from`.
pub async fn logout(State(state): State<AppState>, Form(form): Form<LogoutForm>) -> Response {
    let from = form.from.as_deref().and_then(sanitize_redirect).unwrap_or_else(|| "/".to_owned());
    let path = from.split(['?', '#']).next().unwrap_or("/");
    match state.orchestrator.logout(path).await {
        LogoutOutcome::Redirect(location) => Redirect::to(&location).into_response(),
        LogoutOutcome::Stay => Redirect::to(&from).into_response(),
        LogoutOutcome::Failed => {
            let user = state.store.user();
            let body = "<p class=\"error\" role=\"alert\">Sign-out failed. Please try again.</p>";
            (StatusCode::BAD_GATEWAY, layout("Sign out", user.as_ref(), &from, body)).into_response()
        }
    }
}

// =============================================================================
// REGISTER
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

fn register_form(email: &str, redirect_to: Option<&str>, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{error}<form method="post" action="/auth/register">{redirect}<label>Email <input type="email" name="email" value="{email}"></label><label>Password <input type="password" name="password"></label><label>Confirm password <input type="password" name="confirm_password"></label><button type="submit">Create account</button></form><p><a href="/auth/login">Already have an account?</a></p>"#,
        error = error_block(error),
        redirect = redirect_field(redirect_to),
        email = escape(email),
    );
    layout("Create account", None, "/auth/register", &body)
}

/// `GET /auth/register`
pub async fn register_page(RawQuery(query): RawQuery) -> Html<String> {
    register_form("", redirect_param(query.as_deref()), None)
}

/// `POST /auth/register`
pub async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let result = state
        .orchestrator
        .register(&form.email, &form.password, &form.confirm_password, form.redirect_to.as_deref())
        .await;
    match result {
        Ok(RegisterOutcome::SignedIn { redirect } | RegisterOutcome::ConfirmationRequired { redirect }) => {
            Redirect::to(&redirect).into_response()
        }
        Err(err) => {
            let message = err.to_string();
            let page = register_form(form.email.trim(), form.redirect_to.as_deref(), Some(&message));
            (error_status(&err), page).into_response()
        }
    }
}

/// `GET /auth/verify-email`
pub async fn verify_email_page() -> Html<String> {
    let body = "<p>We sent you a confirmation link. Follow it to finish creating your account, then sign in.</p>";
    layout("Check your email", None, "/auth/verify-email", body)
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AuthStateView {
    #[serde(flatten)]
    state: AuthState,
    phase: AuthPhase,
}

/// `GET /api/auth/state`: current `AuthState` as JSON.
pub async fn state(State(state): State<AppState>) -> Json<AuthStateView> {
    Json(AuthStateView { phase: state.store.phase(), state: state.store.snapshot() })
}
