//! Page and API handlers. Access control is applied by the router, not here.

use askama::Template;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::{Value as JsonValue, json};

use crate::middleware::{CurrentUser, DEFAULT_REDIRECT, LOGIN_PATH, LOGOUT_PATH};
use crate::types::User;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    user: Option<User>,
    login_path: &'static str,
    logout_path: &'static str,
    dashboard_path: &'static str,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    user: &'a User,
    logout_path: &'static str,
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate<'a> {
    user: &'a User,
    logout_path: &'static str,
    dashboard_path: &'static str,
}

/// Public home page.
pub async fn index(user: Option<CurrentUser>) -> Response {
    render(IndexTemplate {
        user: user.map(|CurrentUser(u)| u),
        login_path: LOGIN_PATH,
        logout_path: LOGOUT_PATH,
        dashboard_path: DEFAULT_REDIRECT,
    })
}

pub async fn dashboard(CurrentUser(user): CurrentUser) -> Response {
    render(DashboardTemplate {
        user: &user,
        logout_path: LOGOUT_PATH,
    })
}

pub async fn admin(CurrentUser(user): CurrentUser) -> Response {
    render(AdminTemplate {
        user: &user,
        logout_path: LOGOUT_PATH,
        dashboard_path: DEFAULT_REDIRECT,
    })
}

/// The session's user record as JSON.
pub async fn api_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

fn render(template: impl Template) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template render error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
