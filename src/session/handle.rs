use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parking_lot::Mutex;

use super::data::{PendingLogin, SessionData};
use crate::middleware::AuthError;
use crate::types::{SessionId, User};

#[derive(Debug)]
struct Inner {
    id: Option<SessionId>,
    data: SessionData,
    modified: bool,
    renew: bool,
}

/// Request-scoped handle to the browser's session.
///
/// Inserted into request extensions by the session layer, which loads the data
/// before the handler runs and persists it afterwards if it changed. Clones
/// share the same state.
///
/// ```rust,ignore
/// async fn whoami(session: Session) -> String {
///     session.user().map_or("anonymous".into(), |u| u.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

/// What the session layer must do once the response has been produced.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Change {
    Unchanged,
    /// Persist under the current id (or a fresh one if there is none).
    Save(SessionData),
    /// Persist under a fresh id and drop the old record.
    Renew(SessionData),
    /// Drop the record and the cookie.
    Purge,
}

impl Session {
    pub(crate) fn new(id: Option<SessionId>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id,
                data,
                modified: false,
                renew: false,
            })),
        }
    }

    /// The authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.lock().data.user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().data.user.is_some()
    }

    /// Realm roles of the current user; empty when nobody is logged in.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.inner
            .lock()
            .data
            .user
            .as_ref()
            .map(|u| u.roles.clone())
            .unwrap_or_default()
    }

    /// Raw ID token of the current user, used as `id_token_hint` on logout.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.inner
            .lock()
            .data
            .user
            .as_ref()
            .and_then(|u| u.token.id_token.clone())
    }

    /// Record a new login attempt, replacing any previous one. An existing
    /// `user` is left in place.
    pub fn begin_login(&self, pending: PendingLogin) {
        let mut inner = self.inner.lock();
        inner.data.set_pending(pending);
        inner.modified = true;
    }

    /// Remove the pending login and return it. The `oauth_*` keys are gone
    /// afterwards even when they were incomplete.
    pub fn take_pending_login(&self) -> Option<PendingLogin> {
        let mut inner = self.inner.lock();
        if !inner.data.has_pending() {
            return None;
        }
        inner.modified = true;
        inner.data.take_pending()
    }

    /// Store the authenticated user and rotate the session id.
    pub fn log_in(&self, user: User) {
        let mut inner = self.inner.lock();
        inner.data.user = Some(user);
        inner.modified = true;
        inner.renew = true;
    }

    /// Drop everything in the session.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.data = SessionData::default();
        inner.modified = true;
        inner.renew = false;
    }

    /// Snapshot of the stored data.
    #[must_use]
    pub fn data(&self) -> SessionData {
        self.inner.lock().data.clone()
    }

    pub(crate) fn id(&self) -> Option<SessionId> {
        self.inner.lock().id.clone()
    }

    pub(crate) fn change(&self) -> Change {
        let inner = self.inner.lock();
        match (inner.modified, inner.renew) {
            (false, _) => Change::Unchanged,
            _ if inner.data.is_empty() => Change::Purge,
            (true, true) => Change::Renew(inner.data.clone()),
            (true, false) => Change::Save(inner.data.clone()),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AuthError::Store("session layer is not installed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenBundle;

    fn user(roles: &[&str]) -> User {
        User {
            name: Some("Ada".into()),
            email: None,
            username: Some("ada".into()),
            sub: "sub-1".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            token: TokenBundle {
                access_token: "at".into(),
                refresh_token: None,
                id_token: Some("id-token".into()),
                expires_at: None,
            },
        }
    }

    fn pending() -> PendingLogin {
        PendingLogin {
            nonce: "n".into(),
            state: "s".into(),
            code_verifier: "v".into(),
            redirect_uri: "r".into(),
        }
    }

    #[test]
    fn fresh_session_is_unchanged() {
        let session = Session::new(None, SessionData::default());
        assert!(!session.is_authenticated());
        assert!(session.roles().is_empty());
        assert_eq!(session.take_pending_login(), None);
        assert_eq!(session.change(), Change::Unchanged);
    }

    #[test]
    fn begin_login_keeps_existing_user() {
        let session = Session::new(
            Some(SessionId::generate()),
            SessionData {
                user: Some(user(&["a"])),
                ..SessionData::default()
            },
        );

        session.begin_login(pending());

        assert!(session.is_authenticated());
        assert!(matches!(session.change(), Change::Save(data) if data.oauth_nonce.as_deref() == Some("n")));
    }

    #[test]
    fn take_pending_then_nothing_left_purges() {
        let session = Session::new(Some(SessionId::generate()), SessionData::default());
        session.begin_login(pending());

        assert_eq!(session.take_pending_login(), Some(pending()));
        assert_eq!(session.change(), Change::Purge);
    }

    #[test]
    fn log_in_renews() {
        let session = Session::new(None, SessionData::default());
        session.begin_login(pending());
        session.take_pending_login();
        session.log_in(user(&["realm-admin"]));

        assert!(session.roles().contains("realm-admin"));
        assert_eq!(session.id_token().as_deref(), Some("id-token"));
        assert!(matches!(session.change(), Change::Renew(data) if data.oauth_nonce.is_none()));
    }

    #[test]
    fn clear_purges() {
        let session = Session::new(
            Some(SessionId::generate()),
            SessionData {
                user: Some(user(&[])),
                ..SessionData::default()
            },
        );
        session.clear();

        assert!(!session.is_authenticated());
        assert_eq!(session.change(), Change::Purge);
    }
}
