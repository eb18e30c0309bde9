use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use super::config::LOGIN_PATH;

/// Authentication errors for the web layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No user in the session. `next` is the path to come back to after login.
    #[error("Not authenticated")]
    Unauthenticated { next: String },

    /// Logged in, but without the required realm role.
    #[error("Forbidden (missing role: {0})")]
    MissingRole(String),

    /// The authorization callback could not be completed.
    #[error("Error during authentication: {0}")]
    Callback(String),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),
}

impl AuthError {
    /// `/login?next=<path>`
    #[must_use]
    pub fn login_location(next: &str) -> String {
        format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated { ref next } => {
                Redirect::to(&Self::login_location(next)).into_response()
            }
            Self::MissingRole(_) => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            Self::Callback(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::Store(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        Self::Callback(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    #[test]
    fn unauthenticated_redirects_to_login_with_next() {
        let response = AuthError::Unauthenticated {
            next: "/api/me".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login?next=%2Fapi%2Fme");
    }

    #[test]
    fn missing_role_is_forbidden() {
        let response = AuthError::MissingRole("realm-admin".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn library_errors_become_bad_request() {
        let error: AuthError = crate::error::Error::Nonce.into();
        assert_eq!(error.to_string(), "Error during authentication: nonce validation failed");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
