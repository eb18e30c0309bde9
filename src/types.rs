use std::collections::BTreeSet;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::id_token::{ClaimPath, IdTokenClaims};
use crate::oidc::TokenResponse;

/// Opaque server-side session identifier.
///
/// Generated by [`generate_session_id`](crate::random::generate_session_id) and
/// carried in the private session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::random::generate_session_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw tokens returned by the provider, kept with the user for later API calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    /// Unix timestamp (seconds) at which `access_token` expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenBundle {
    /// Build the bundle from a token endpoint response received at `now` (unix seconds).
    #[must_use]
    pub fn from_response(response: &TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            id_token: response.id_token.clone(),
            expires_at: response
                .expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .map(|secs| now.saturating_add(secs)),
        }
    }
}

/// The authenticated user, as stored in the session under `user`.
///
/// Created once per successful login and never mutated afterwards; a new
/// login replaces it, logout destroys it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Provider-issued stable subject identifier (`sub` claim).
    pub sub: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    pub token: TokenBundle,
}

impl User {
    /// Extract the user record from verified ID token claims.
    ///
    /// `name` falls back to `preferred_username`. Roles are read from
    /// `roles_claim`; an absent or non-array claim yields no roles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the claims carry no `sub`.
    pub fn from_claims(
        claims: &IdTokenClaims,
        roles_claim: &ClaimPath,
        token: TokenBundle,
    ) -> Result<Self, Error> {
        let sub = claims
            .get_str("sub")
            .ok_or_else(|| Error::Token("missing claim: sub".into()))?
            .to_owned();
        let username = claims.get_str("preferred_username").map(str::to_owned);

        Ok(Self {
            name: claims
                .get_str("name")
                .map(str::to_owned)
                .or_else(|| username.clone()),
            email: claims.get_str("email").map(str::to_owned),
            username,
            sub,
            roles: claims.roles(roles_claim),
            token,
        })
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Best display label: name, then username, then subject id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn token() -> TokenBundle {
        TokenBundle {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            id_token: Some("it".into()),
            expires_at: Some(1_700_000_300),
        }
    }

    #[test]
    fn user_from_full_claims() {
        let claims = IdTokenClaims::from_value(json!({
            "sub": "f3b1c7",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "preferred_username": "ada",
            "realm_access": { "roles": ["realm-admin", "offline_access"] }
        }))
        .unwrap();

        let user = User::from_claims(&claims, &ClaimPath::default(), token()).unwrap();

        assert_eq!(user.sub, "f3b1c7");
        assert_eq!(user.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.username.as_deref(), Some("ada"));
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(user.has_role("realm-admin"));
        assert!(user.has_role("offline_access"));
        assert_eq!(user.roles.len(), 2);
    }

    #[test]
    fn name_falls_back_to_preferred_username() {
        let claims = IdTokenClaims::from_value(json!({
            "sub": "s", "preferred_username": "jdoe"
        }))
        .unwrap();

        let user = User::from_claims(&claims, &ClaimPath::default(), token()).unwrap();

        assert_eq!(user.name.as_deref(), Some("jdoe"));
        assert!(user.roles.is_empty());
        assert_eq!(user.display_name(), "jdoe");
    }

    #[test]
    fn missing_sub_is_rejected() {
        let claims = IdTokenClaims::from_value(json!({ "name": "x" })).unwrap();
        assert!(User::from_claims(&claims, &ClaimPath::default(), token()).is_err());
    }

    #[test]
    fn token_bundle_computes_expiry() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "at",
            "token_type": "Bearer",
            "expires_in": 300,
            "id_token": "it"
        }))
        .unwrap();

        let bundle = TokenBundle::from_response(&response, 1_000);

        assert_eq!(bundle.expires_at, Some(1_300));
        assert_eq!(bundle.refresh_token, None);
        assert_eq!(bundle.id_token.as_deref(), Some("it"));
    }

    #[test]
    fn user_json_shape() {
        let user = User {
            name: None,
            email: None,
            username: None,
            sub: "s".into(),
            roles: ["b".to_string(), "a".to_string()].into_iter().collect(),
            token: token(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["roles"], json!(["a", "b"]));
        assert_eq!(value["token"]["id_token"], json!("it"));
        assert_eq!(value["sub"], json!("s"));
    }

    #[test]
    fn session_id_generate_is_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
