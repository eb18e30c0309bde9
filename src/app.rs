//! Router assembly: public pages, guarded pages, auth routes and health.

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::middleware::{AuthConfig, RequiredRole, auth_routes, require_authenticated, require_role};
use crate::pages;
use crate::session::{SessionSettings, SessionStore, with_sessions};

/// Realm role required for `/admin`.
pub const ADMIN_ROLE: &str = "realm-admin";

/// Build the application router.
///
/// `/health` sits outside the session layer, so it never reads or sets a
/// session cookie.
pub fn router<S: SessionStore>(auth: AuthConfig, store: Arc<S>, sessions: SessionSettings) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/api/me", get(pages::api_me))
        .route_layer(from_fn(require_authenticated));

    // Last route_layer runs first: authenticate, then check the role.
    let admin = Router::new()
        .route("/admin", get(pages::admin))
        .route_layer(from_fn_with_state(RequiredRole::new(ADMIN_ROLE), require_role))
        .route_layer(from_fn(require_authenticated));

    let with_session = Router::new()
        .route("/", get(pages::index))
        .merge(protected)
        .merge(admin)
        .merge(auth_routes(auth));

    with_sessions(with_session, store, sessions)
        .route("/health", get(pages::health))
        .layer(TraceLayer::new_for_http())
}
