use serde::{Deserialize, Serialize};

use crate::types::User;

/// State of a login that has been started at `/login` but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub nonce: String,
    pub state: String,
    pub code_verifier: String,
    /// Callback URL sent to the provider; the token request must repeat it verbatim.
    pub redirect_uri: String,
}

/// Everything stored for one browser session.
///
/// The `oauth_*` keys only exist between `/login` and the matching
/// `/auth/callback`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_code_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl SessionData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn set_pending(&mut self, pending: PendingLogin) {
        self.oauth_nonce = Some(pending.nonce);
        self.oauth_state = Some(pending.state);
        self.oauth_code_verifier = Some(pending.code_verifier);
        self.oauth_redirect_uri = Some(pending.redirect_uri);
    }

    /// Removes every `oauth_*` key. Returns the pending login only if it was complete.
    pub(crate) fn take_pending(&mut self) -> Option<PendingLogin> {
        let nonce = self.oauth_nonce.take();
        let state = self.oauth_state.take();
        let code_verifier = self.oauth_code_verifier.take();
        let redirect_uri = self.oauth_redirect_uri.take();

        Some(PendingLogin {
            nonce: nonce?,
            state: state?,
            code_verifier: code_verifier?,
            redirect_uri: redirect_uri?,
        })
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.oauth_nonce.is_some()
            || self.oauth_state.is_some()
            || self.oauth_code_verifier.is_some()
            || self.oauth_redirect_uri.is_some()
    }
}
