//! Route guards, applied with `axum::middleware::from_fn` / `from_fn_with_state`.
//!
//! Composition order matters: [`require_authenticated`] must run before
//! [`require_role`]. On its own, `require_role` treats a missing user as an
//! empty role set and answers 403 instead of redirecting to the login page.
//! With `route_layer`, the layer added last runs first:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/admin", get(admin))
//!     .route_layer(from_fn_with_state(RequiredRole::new("realm-admin"), require_role))
//!     .route_layer(from_fn(require_authenticated));
//! ```

use std::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::AuthError;
use crate::session::Session;

/// Let the request through only if the session holds a user; otherwise
/// redirect to `/login?next=<requested path>` without calling the handler.
pub async fn require_authenticated(session: Session, request: Request, next: Next) -> Response {
    if session.is_authenticated() {
        return next.run(request).await;
    }

    let path = original_path(request.extensions().get::<OriginalUri>(), request.uri().path());
    tracing::debug!(path = %path, "Anonymous request to protected route");
    AuthError::Unauthenticated { next: path }.into_response()
}

/// Realm role checked by [`require_role`].
#[derive(Debug, Clone)]
pub struct RequiredRole(Arc<str>);

impl RequiredRole {
    #[must_use]
    pub fn new(role: impl Into<Arc<str>>) -> Self {
        Self(role.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Let the request through only if the session user has the role; otherwise
/// 403 naming the missing role. No user counts as no roles.
pub async fn require_role(
    State(role): State<RequiredRole>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    if session.roles().contains(role.as_str()) {
        return next.run(request).await;
    }

    let sub = session.user().map(|u| u.sub);
    tracing::warn!(
        role = role.as_str(),
        sub = sub.as_deref().unwrap_or("<anonymous>"),
        "Access denied: missing role"
    );
    AuthError::MissingRole(role.as_str().to_owned()).into_response()
}

pub(super) fn request_path(parts: &Parts) -> String {
    original_path(parts.extensions.get::<OriginalUri>(), parts.uri.path())
}

fn original_path(original: Option<&OriginalUri>, fallback: &str) -> String {
    original.map_or_else(|| fallback.to_owned(), |uri| uri.path().to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode, header};
    use axum::middleware::{from_fn, from_fn_with_state};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::session::{MemoryStore, SessionSettings, with_sessions};

    // Only require_role, no authentication guard in front of it.
    fn role_only_app() -> Router {
        let routes = Router::new()
            .route("/admin", get(|| async { "admin" }))
            .route_layer(from_fn_with_state(RequiredRole::new("realm-admin"), require_role));
        with_sessions(routes, Arc::new(MemoryStore::new()), SessionSettings::ephemeral())
    }

    fn auth_only_app() -> Router {
        let nested = Router::new()
            .route("/reports", get(|| async { "reports" }))
            .route_layer(from_fn(require_authenticated));
        let routes = Router::new().nest("/team", nested);
        with_sessions(routes, Arc::new(MemoryStore::new()), SessionSettings::ephemeral())
    }

    async fn send(app: Router, uri: &str) -> Response {
        app.oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn role_guard_alone_answers_403_for_anonymous() {
        let response = send(role_only_app(), "/admin").await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Forbidden (missing role: realm-admin)");
    }

    #[tokio::test]
    async fn auth_guard_uses_original_path_under_nest() {
        let response = send(auth_only_app(), "/team/reports?page=2").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login?next=%2Fteam%2Freports");
    }

    #[test]
    fn required_role_as_str() {
        assert_eq!(RequiredRole::new("realm-admin").as_str(), "realm-admin");
    }
}
