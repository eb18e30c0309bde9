use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRef, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use time::Duration;

use super::cookies;
use super::data::SessionData;
use super::handle::{Change, Session};
use super::store::SessionStore;
use crate::middleware::AuthError;
use crate::types::SessionId;

/// Session cookie and lifetime settings.
///
/// The cookie only carries the session id, encrypted and authenticated with
/// `cookie_key`; the data stays in the [`SessionStore`].
#[derive(Clone)]
pub struct SessionSettings {
    pub(crate) cookie_key: Key,
    pub(crate) cookie_name: String,
    pub(crate) ttl: Duration,
    pub(crate) secure: bool,
}

impl SessionSettings {
    /// Settings with the given cookie key and defaults for everything else.
    #[must_use]
    pub fn new(cookie_key: Key) -> Self {
        Self {
            cookie_key,
            cookie_name: "realm_gate_session".into(),
            ttl: Duration::hours(8),
            secure: true,
        }
    }

    /// Settings with a random key: sessions do not survive a restart.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(Key::generate())
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

pub(crate) struct SessionLayerState<S> {
    store: Arc<S>,
    settings: SessionSettings,
}

// Manual Clone: avoid derive adding `S: Clone` bound.
impl<S> Clone for SessionLayerState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<SessionLayerState<S>> for Key {
    fn from_ref(state: &SessionLayerState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}

/// Wrap every route of `router` with session handling.
///
/// Routes added to the returned router afterwards, or merged from elsewhere,
/// are not covered.
pub fn with_sessions<S: SessionStore>(
    router: Router,
    store: Arc<S>,
    settings: SessionSettings,
) -> Router {
    let state = SessionLayerState { store, settings };
    router.layer(middleware::from_fn_with_state(state, session_middleware::<S>))
}

async fn session_middleware<S: SessionStore>(
    State(state): State<SessionLayerState<S>>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_id = jar
        .get(&state.settings.cookie_name)
        .map(|c| SessionId(c.value().to_string()));

    let (id, data) = match cookie_id {
        Some(id) => match state.store.load(&id).await {
            Ok(Some(data)) => (Some(id), data),
            Ok(None) => {
                tracing::debug!("Session cookie refers to an unknown or expired session");
                (None, SessionData::default())
            }
            Err(e) => return AuthError::Store(e.to_string()).into_response(),
        },
        None => (None, SessionData::default()),
    };
    let stale_cookie = id.is_none() && jar.get(&state.settings.cookie_name).is_some();

    let session = Session::new(id, data);
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    match persist(&state, &session, jar, stale_cookie).await {
        Ok(jar) => (jar, response).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn persist<S: SessionStore>(
    state: &SessionLayerState<S>,
    session: &Session,
    jar: PrivateCookieJar,
    stale_cookie: bool,
) -> Result<PrivateCookieJar, AuthError> {
    let settings = &state.settings;
    let store_error = |e: super::store::StoreError| AuthError::Store(e.to_string());

    let (id, data) = match session.change() {
        Change::Unchanged if stale_cookie => {
            return Ok(jar.remove(cookies::clear_session_cookie(&settings.cookie_name)));
        }
        Change::Unchanged => return Ok(jar),
        Change::Purge => {
            if let Some(id) = session.id() {
                state.store.delete(&id).await.map_err(store_error)?;
            }
            return Ok(jar.remove(cookies::clear_session_cookie(&settings.cookie_name)));
        }
        Change::Save(data) => (session.id().unwrap_or_else(SessionId::generate), data),
        Change::Renew(data) => {
            if let Some(old) = session.id() {
                state.store.delete(&old).await.map_err(store_error)?;
            }
            (SessionId::generate(), data)
        }
    };

    state
        .store
        .save(&id, &data, settings.ttl)
        .await
        .map_err(store_error)?;

    Ok(jar.add(cookies::session_cookie(
        &settings.cookie_name,
        id.as_str(),
        settings.ttl,
        settings.secure,
    )))
}
