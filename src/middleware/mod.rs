//! OIDC login flow and access guards for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use realm_gate::middleware::{AuthConfig, RequiredRole, auth_routes, require_authenticated, require_role};
//! use realm_gate::session::{MemoryStore, SessionSettings, with_sessions};
//!
//! // 1. Discover the provider
//! let client = OidcClient::discover(oidc_config, http_client).await?;
//!
//! // 2. Mount auth routes and guard the protected ones
//! let routes = Router::new()
//!     .merge(auth_routes(AuthConfig::new(client, base_url)))
//!     .merge(
//!         Router::new()
//!             .route("/dashboard", get(dashboard))
//!             .route_layer(from_fn(require_authenticated)),
//!     );
//!
//! // 3. Wrap everything in the session layer
//! let app = with_sessions(routes, Arc::new(MemoryStore::new()), SessionSettings::ephemeral());
//! ```

mod config;
mod error;
mod extractor;
mod guard;
mod routes;
mod state;

pub use config::{AuthConfig, CALLBACK_PATH, DEFAULT_REDIRECT, LOGIN_PATH, LOGOUT_PATH};
pub use error::AuthError;
pub use extractor::CurrentUser;
pub use guard::{RequiredRole, require_authenticated, require_role};
pub use routes::auth_routes;
