use std::sync::Arc;

use super::config::AuthSettings;
use crate::oidc::OidcClient;

/// Shared state for auth route handlers.
#[derive(Clone)]
pub(super) struct AuthState {
    pub(super) client: Arc<OidcClient>,
    pub(super) settings: AuthSettings,
}
