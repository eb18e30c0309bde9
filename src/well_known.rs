use serde::{Deserialize, Serialize};
use url::Url;

/// OpenID Provider metadata (`/.well-known/openid-configuration`).
///
/// Only the fields this client uses are modeled; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
    #[serde(default)]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default)]
    pub end_session_endpoint: Option<Url>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Metadata for providers that are not discovered at runtime (tests, static setups).
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        authorization_endpoint: Url,
        token_endpoint: Url,
        jwks_uri: Url,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint,
            token_endpoint,
            jwks_uri,
            userinfo_endpoint: None,
            end_session_endpoint: None,
            id_token_signing_alg_values_supported: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_end_session_endpoint(mut self, url: Url) -> Self {
        self.end_session_endpoint = Some(url);
        self
    }

    #[must_use]
    pub fn with_signing_algs(mut self, algs: Vec<String>) -> Self {
        self.id_token_signing_alg_values_supported = algs;
        self
    }
}
