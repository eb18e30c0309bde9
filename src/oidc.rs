use std::sync::Arc;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::id_token::{self, ExpectedClaims, IdTokenClaims};
use crate::well_known::ProviderMetadata;

/// OpenID Connect client configuration.
///
/// Required fields are constructor parameters.
///
/// ```rust,ignore
/// use realm_gate::OidcConfig;
///
/// let config = OidcConfig::new(
///     "https://sso.example.com/realms/demo".parse()?,
///     "demo-app",
///     "client-secret",
/// )
/// .with_scopes(vec!["openid".into(), "email".into()]);
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) issuer: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) scopes: Vec<String>,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer", &self.issuer.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OidcConfig {
    #[must_use]
    pub fn new(
        issuer: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            issuer,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
        }
    }

    /// Issuer of a Keycloak realm: `{base_url}/realms/{realm}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the result is not a valid URL.
    pub fn keycloak_issuer(base_url: &str, realm: &str) -> Result<Url, Error> {
        let issuer = format!("{}/realms/{realm}", base_url.trim_end_matches('/'));
        issuer
            .parse()
            .map_err(|e| Error::Config(format!("issuer '{issuer}': {e}")))
    }

    /// Override the requested scopes (default: `openid profile email`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// `{issuer}/.well-known/openid-configuration`
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer.as_str().trim_end_matches('/')
        )
    }
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Parameters of one authorization request.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationParams<'a> {
    pub redirect_uri: &'a str,
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
}

/// OpenID Connect relying-party client.
///
/// Holds the discovered provider metadata, a dedicated HTTP client and a JWKS
/// cache. Share it behind an `Arc`.
pub struct OidcClient {
    config: OidcConfig,
    metadata: ProviderMetadata,
    http: reqwest::Client,
    jwks: RwLock<Option<Arc<JwkSet>>>,
}

impl OidcClient {
    /// Fetch the discovery document and build a client from it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the document cannot be fetched,
    /// [`Error::OAuth`] on a non-success status, or [`Error::Discovery`] if
    /// the advertised issuer differs from the configured one.
    pub async fn discover(config: OidcConfig, http: reqwest::Client) -> Result<Self, Error> {
        let url = config.discovery_url();
        tracing::debug!(url = %url, "Fetching OpenID provider metadata");

        let response = http.get(&url).send().await?;
        let response = Self::ensure_success(response, "discovery").await?;
        let metadata: ProviderMetadata = response.json().await?;

        let expected = config.issuer.as_str().trim_end_matches('/');
        if metadata.issuer.trim_end_matches('/') != expected {
            return Err(Error::Discovery(format!(
                "issuer mismatch: expected '{expected}', got '{}'",
                metadata.issuer
            )));
        }

        tracing::info!(issuer = %metadata.issuer, "OpenID provider discovered");
        Ok(Self::from_metadata(config, metadata, http))
    }

    /// Build a client from known metadata, skipping discovery.
    #[must_use]
    pub fn from_metadata(config: OidcConfig, metadata: ProviderMetadata, http: reqwest::Client) -> Self {
        Self {
            config,
            metadata,
            http,
            jwks: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    #[must_use]
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Authorization endpoint URL for the code flow, with `state`, `nonce` and
    /// an S256 PKCE challenge.
    #[must_use]
    pub fn authorization_url(&self, params: &AuthorizationParams<'_>) -> Url {
        let scope = self.config.scopes.join(" ");

        let mut url = self.metadata.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", params.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("state", params.state)
            .append_pair("nonce", params.nonce)
            .append_pair("code_challenge", params.code_challenge)
            .append_pair("code_challenge_method", "S256");
        url
    }

    /// Exchange an authorization code for tokens (`client_secret_basic`).
    ///
    /// `redirect_uri` must be the exact value sent in the authorization request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout, or
    /// [`Error::OAuth`] if the token endpoint returns an error.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.metadata.token_endpoint.clone())
            .basic_auth(
                urlencoding::encode(&self.config.client_id),
                Some(urlencoding::encode(&self.config.client_secret)),
            )
            .form(&params)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Verify an ID token against this client and the expected nonce.
    ///
    /// HMAC-signed tokens are checked with the client secret; asymmetric ones
    /// with the provider's JWKS, refreshed once when the `kid` is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] on signature/claim failure or a disallowed
    /// algorithm, [`Error::Nonce`] on nonce mismatch, and [`Error::Http`] /
    /// [`Error::OAuth`] if the JWKS cannot be fetched.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        nonce: &str,
    ) -> Result<IdTokenClaims, Error> {
        let (algorithm, kid) = id_token::peek_header(id_token)?;
        if !self.algorithm_allowed(algorithm) {
            return Err(Error::Token(format!("algorithm {algorithm:?} not allowed")));
        }

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(self.config.client_secret.as_bytes())
            }
            _ => self.signing_key(kid.as_deref()).await?,
        };

        let expected = ExpectedClaims {
            issuer: &self.metadata.issuer,
            audience: &self.config.client_id,
            nonce,
        };
        id_token::verify_id_token(id_token, &key, algorithm, &expected)
    }

    /// Provider logout URL (RP-initiated logout).
    ///
    /// Falls back to Keycloak's `{issuer}/protocol/openid-connect/logout` when
    /// the provider does not advertise an `end_session_endpoint`.
    #[must_use]
    pub fn end_session_url(&self, redirect_uri: &Url, id_token_hint: Option<&str>) -> Url {
        let mut url = self.metadata.end_session_endpoint.clone().unwrap_or_else(|| {
            let mut url = self.config.issuer.clone();
            url.set_path(&format!(
                "{}/protocol/openid-connect/logout",
                url.path().trim_end_matches('/')
            ));
            url
        });

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("post_logout_redirect_uri", redirect_uri.as_str())
                .append_pair("client_id", &self.config.client_id);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }
        url
    }

    /// Algorithms advertised by the provider; RS256 when it advertises none.
    fn algorithm_allowed(&self, algorithm: Algorithm) -> bool {
        let advertised = &self.metadata.id_token_signing_alg_values_supported;
        if advertised.is_empty() {
            return algorithm == Algorithm::RS256;
        }
        advertised
            .iter()
            .filter_map(|alg| alg.parse::<Algorithm>().ok())
            .any(|alg| alg == algorithm)
    }

    async fn signing_key(&self, kid: Option<&str>) -> Result<DecodingKey, Error> {
        let cached = self.jwks.read().clone();
        let jwks = match cached {
            Some(jwks) if Self::find_key(&jwks, kid).is_some() => jwks,
            _ => self.refresh_jwks().await?,
        };

        let jwk = Self::find_key(&jwks, kid).ok_or_else(|| {
            Error::Token(format!("no signing key for kid {:?}", kid.unwrap_or("<none>")))
        })?;
        DecodingKey::from_jwk(jwk).map_err(Into::into)
    }

    fn find_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a jsonwebtoken::jwk::Jwk> {
        match kid {
            Some(kid) => jwks.find(kid),
            None if jwks.keys.len() == 1 => jwks.keys.first(),
            None => None,
        }
    }

    async fn refresh_jwks(&self) -> Result<Arc<JwkSet>, Error> {
        tracing::debug!(url = %self.metadata.jwks_uri, "Fetching provider JWKS");
        let response = self.http.get(self.metadata.jwks_uri.clone()).send().await?;
        let response = Self::ensure_success(response, "jwks request").await?;
        let jwks = Arc::new(response.json::<JwkSet>().await?);
        *self.jwks.write() = Some(jwks.clone());
        Ok(jwks)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::id_token::tests::{CLIENT_ID, CLIENT_SECRET, ISSUER, claims_with_nonce, sign};

    pub(crate) fn test_metadata(provider: &str) -> ProviderMetadata {
        ProviderMetadata::new(
            ISSUER,
            format!("{provider}/auth").parse().unwrap(),
            format!("{provider}/token").parse().unwrap(),
            format!("{provider}/certs").parse().unwrap(),
        )
        .with_end_session_endpoint(format!("{provider}/protocol/openid-connect/logout").parse().unwrap())
        .with_signing_algs(vec!["RS256".into(), "HS256".into()])
    }

    pub(crate) fn test_client(provider: &str) -> OidcClient {
        OidcClient::from_metadata(
            OidcConfig::new(ISSUER.parse().unwrap(), CLIENT_ID, CLIENT_SECRET),
            test_metadata(provider),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_authorization_url_contains_oidc_params() {
        let client = test_client("https://sso.example.com");
        let url = client.authorization_url(&AuthorizationParams {
            redirect_uri: "https://app.example.com/auth/callback?next=/admin",
            state: "st",
            nonce: "nn",
            code_challenge: "cc",
        });

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/auth");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], CLIENT_ID);
        assert_eq!(pairs["scope"], "openid profile email");
        assert_eq!(pairs["redirect_uri"], "https://app.example.com/auth/callback?next=/admin");
        assert_eq!(pairs["nonce"], "nn");
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn test_end_session_url_with_and_without_hint() {
        let client = test_client("https://sso.example.com");
        let home: Url = "https://app.example.com/".parse().unwrap();

        let without = client.end_session_url(&home, None);
        assert!(without.path().ends_with("/protocol/openid-connect/logout"));
        assert!(!without.as_str().contains("id_token_hint"));

        let with = client.end_session_url(&home, Some("tok"));
        let pairs: std::collections::HashMap<_, _> = with.query_pairs().into_owned().collect();
        assert_eq!(pairs["id_token_hint"], "tok");
        assert_eq!(pairs["redirect_uri"], "https://app.example.com/");
    }

    #[test]
    fn test_end_session_url_falls_back_to_keycloak_path() {
        let metadata = ProviderMetadata::new(
            ISSUER,
            "https://sso.example.com/auth".parse().unwrap(),
            "https://sso.example.com/token".parse().unwrap(),
            "https://sso.example.com/certs".parse().unwrap(),
        );
        let client = OidcClient::from_metadata(
            OidcConfig::new(ISSUER.parse().unwrap(), CLIENT_ID, CLIENT_SECRET),
            metadata,
            reqwest::Client::new(),
        );

        let url = client.end_session_url(&"https://app.example.com/".parse().unwrap(), None);
        assert_eq!(url.path(), "/realms/demo/protocol/openid-connect/logout");
    }

    #[test]
    fn test_keycloak_issuer() {
        let issuer = OidcConfig::keycloak_issuer("https://sso.example.com/", "demo").unwrap();
        assert_eq!(issuer.as_str(), ISSUER);

        let config = OidcConfig::new(issuer, CLIENT_ID, CLIENT_SECRET);
        assert_eq!(
            config.discovery_url(),
            "https://sso.example.com/realms/demo/.well-known/openid-configuration"
        );
        assert!(!format!("{config:?}").contains(CLIENT_SECRET));
    }

    #[tokio::test]
    async fn test_discover_checks_issuer() {
        let server = MockServer::start().await;
        let issuer = format!("{}/realms/demo", server.uri());
        Mock::given(method("GET"))
            .and(path("/realms/demo/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
                "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
                "jwks_uri": format!("{issuer}/protocol/openid-connect/certs"),
            })))
            .mount(&server)
            .await;

        let config = OidcConfig::new(issuer.parse().unwrap(), CLIENT_ID, CLIENT_SECRET);
        let client = OidcClient::discover(config, reqwest::Client::new()).await.unwrap();
        assert_eq!(client.metadata().issuer, issuer);

        let other = OidcConfig::new(
            format!("{}/realms/demo-other", server.uri()).parse().unwrap(),
            CLIENT_ID,
            CLIENT_SECRET,
        );
        assert!(OidcClient::discover(other, reqwest::Client::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=ver"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "token_type": "Bearer",
                "expires_in": 300,
                "refresh_token": "rt",
                "id_token": "it"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let tokens = client
            .exchange_code("the-code", "https://app.example.com/auth/callback", "ver")
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("it"));
        assert_eq!(tokens.expires_in, Some(300));
    }

    #[tokio::test]
    async fn test_exchange_code_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Code not valid"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .exchange_code("stale", "https://app.example.com/auth/callback", "ver")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OAuth { status: Some(400), .. }));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_verify_hs256_id_token() {
        let client = test_client("https://sso.example.com");
        let token = sign(&claims_with_nonce("nonce-1", &["realm-admin"]));

        let claims = client.verify_id_token(&token, "nonce-1").await.unwrap();
        assert_eq!(claims.get_str("preferred_username"), Some("ada"));

        assert!(matches!(
            client.verify_id_token(&token, "nonce-2").await,
            Err(Error::Nonce)
        ));
    }

    #[tokio::test]
    async fn test_disallowed_algorithm_rejected() {
        let metadata = test_metadata("https://sso.example.com").with_signing_algs(vec!["RS256".into()]);
        let client = OidcClient::from_metadata(
            OidcConfig::new(ISSUER.parse().unwrap(), CLIENT_ID, CLIENT_SECRET),
            metadata,
            reqwest::Client::new(),
        );
        let token = sign(&claims_with_nonce("n", &[]));

        assert!(matches!(
            client.verify_id_token(&token, "n").await,
            Err(Error::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_jwks_then_fails() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"rotated"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x"}"#);
        let token = format!("{header}.{payload}.c2ln");

        let err = client.verify_id_token(&token, "n").await.unwrap_err();
        assert!(err.to_string().contains("rotated"));
    }
}
