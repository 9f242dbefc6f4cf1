//! Server-rendered pages.
//!
//! Every page here sits behind the navigation guard, so a handler only runs
//! once the guard has allowed the request.

use std::fmt::Write;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::identity::{Role, User};
use crate::state::AppState;

pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap `body` in the shared page chrome.
///
/// The header shows the signed-in user with a logout form that posts the
/// current path, or a sign-in link.
pub(crate) fn layout(title: &str, user: Option<&User>, current_path: &str, body: &str) -> Html<String> {
    let mut nav = String::from(r#"<a href="/">Home</a> <a href="/blog">Blog</a> <a href="/dashboard">Dashboard</a>"#);
    match user {
        Some(user) => {
            if user.role == Role::Admin {
                nav.push_str(r#" <a href="/admin">Admin</a>"#);
            }
            // Writing to a String cannot fail.
            write!(
                nav,
                r#" <span class="user">{}</span> <form method="post" action="/auth/logout"><input type="hidden" name="from" value="{}"><button type="submit">Sign out</button></form>"#,
                escape(user.label()),
                escape(current_path),
            )
            .unwrap_or_default();
        }
        None => nav.push_str(r#" <a href="/auth/login">Sign in</a> <a href="/auth/register">Register</a>"#),
    }
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><nav>{nav}</nav><main><h1>{title}</h1>{body}</main></body></html>",
        title = escape(title),
    ))
}

// =============================================================================
// PUBLIC
// =============================================================================

pub async fn home(State(state): State<AppState>) -> Html<String> {
    layout("Home", state.store.user().as_ref(), "/", "<p>Welcome.</p>")
}

pub async fn blog(State(state): State<AppState>) -> Html<String> {
    layout("Blog", state.store.user().as_ref(), "/blog", "<p>No posts yet.</p>")
}

pub async fn unauthorized(State(state): State<AppState>) -> Response {
    let body = "<p>You do not have permission to view that page.</p>";
    (StatusCode::FORBIDDEN, layout("Unauthorized", state.store.user().as_ref(), "/unauthorized", body)).into_response()
}

// =============================================================================
// PROTECTED
// =============================================================================

pub async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let user = state.store.user();
    let greeting = user.as_ref().map_or_else(String::new, |u| format!("<p>Signed in as {}.</p>", escape(u.label())));
    layout("Dashboard", user.as_ref(), "/dashboard", &greeting)
}

pub async fn settings(State(state): State<AppState>) -> Html<String> {
    let user = state.store.user();
    let body = user.as_ref().map_or_else(String::new, |u| {
        format!("<dl><dt>Email</dt><dd>{}</dd><dt>Role</dt><dd>{}</dd></dl>", escape(&u.email), u.role.as_str())
    });
    layout("Settings", user.as_ref(), "/dashboard/settings", &body)
}

pub async fn admin(State(state): State<AppState>) -> Html<String> {
    layout("Admin", state.store.user().as_ref(), "/admin", "<p>Administration.</p>")
}
