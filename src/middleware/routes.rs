use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use serde::Deserialize;
use time::OffsetDateTime;

use super::config::{AuthConfig, CALLBACK_PATH, LOGIN_PATH, LOGOUT_PATH};
use super::error::AuthError;
use super::state::AuthState;
use crate::oidc::AuthorizationParams;
use crate::random;
use crate::session::{PendingLogin, Session};
use crate::types::{TokenBundle, User};

/// Create the OIDC login/callback/logout router.
///
/// The returned router expects the session layer to be installed around it.
pub fn auth_routes(config: AuthConfig) -> Router {
    let state = AuthState {
        client: Arc::new(config.client),
        settings: config.settings,
    };

    Router::new()
        .route(LOGIN_PATH, get(login))
        .route(CALLBACK_PATH, get(callback))
        .route(LOGOUT_PATH, get(logout).post(logout))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    next: Option<String>,
}

async fn login(
    State(state): State<AuthState>,
    session: Session,
    Query(params): Query<LoginParams>,
) -> Redirect {
    let mut redirect_uri = state.settings.callback_url();
    if let Some(next) = params.next.as_deref().filter(|n| !n.is_empty()) {
        redirect_uri.query_pairs_mut().append_pair("next", next);
    }

    let pending = PendingLogin {
        nonce: random::generate_nonce(),
        state: random::generate_state(),
        code_verifier: random::generate_code_verifier(),
        redirect_uri: redirect_uri.into(),
    };
    let code_challenge = random::generate_code_challenge(&pending.code_verifier);

    let url = state.client.authorization_url(&AuthorizationParams {
        redirect_uri: &pending.redirect_uri,
        state: &pending.state,
        nonce: &pending.nonce,
        code_challenge: &code_challenge,
    });

    if session.is_authenticated() {
        tracing::debug!("Login started while authenticated; current user kept until callback succeeds");
    }
    session.begin_login(pending);

    Redirect::to(url.as_str())
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    next: Option<String>,
}

async fn callback(
    State(state): State<AuthState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AuthError> {
    // Consumed up front: the nonce never outlives a callback, whatever happens below.
    let pending = session.take_pending_login();

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or(error);
        tracing::warn!(error = %error, description = %desc, "Authorization error from identity provider");
        return Err(AuthError::Callback(desc.to_string()));
    }

    let pending = pending.ok_or_else(|| {
        tracing::warn!("Callback without a pending login");
        AuthError::Callback("no login in progress".into())
    })?;

    let code = params
        .code
        .ok_or_else(|| AuthError::Callback("missing authorization code".into()))?;

    if params.state.as_deref() != Some(pending.state.as_str()) {
        tracing::warn!("OAuth state mismatch");
        return Err(AuthError::Callback("state mismatch".into()));
    }

    let tokens = state
        .client
        .exchange_code(&code, &pending.redirect_uri, &pending.code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            AuthError::from(e)
        })?;

    let id_token = tokens
        .id_token
        .as_deref()
        .ok_or_else(|| AuthError::Callback("token response did not include an id_token".into()))?;

    let claims = state
        .client
        .verify_id_token(id_token, &pending.nonce)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "ID token validation failed");
            AuthError::from(e)
        })?;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let user = User::from_claims(
        &claims,
        &state.settings.roles_claim,
        TokenBundle::from_response(&tokens, now),
    )?;

    tracing::info!(sub = %user.sub, roles = ?user.roles, "OIDC login successful");
    session.log_in(user);

    let target = state.settings.post_login_target(params.next.as_deref());
    Ok(Redirect::to(&target))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(State(state): State<AuthState>, session: Session) -> Redirect {
    let id_token = session.id_token();
    if let Some(user) = session.user() {
        tracing::info!(sub = %user.sub, "Logging out");
    }

    session.clear();

    let url = state
        .client
        .end_session_url(&state.settings.base_url, id_token.as_deref());
    Redirect::to(url.as_str())
}
