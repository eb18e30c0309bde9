use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use super::error::AuthError;
use super::guard::request_path;
use crate::session::Session;
use crate::types::User;

/// Authenticated user taken from the session.
///
/// Use as an Axum extractor in route handlers. Anonymous requests are
/// redirected to `/login?next=<path>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {} ({})", user.display_name(), user.sub)
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn public(user: Option<CurrentUser>) -> impl IntoResponse {
///     match user {
///         Some(CurrentUser(u)) => format!("Hello, {}", u.display_name()),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = <Session as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        session.user().map(CurrentUser).ok_or_else(|| AuthError::Unauthenticated {
            next: request_path(parts),
        })
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let session = <Session as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        Ok(session.user().map(CurrentUser))
    }
}
