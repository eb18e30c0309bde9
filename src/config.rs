use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use crate::error::Error;
use crate::http::HttpClientConfig;
use crate::id_token::ClaimPath;
use crate::middleware::AuthConfig;
use crate::oidc::{OidcClient, OidcConfig};
use crate::session::SessionSettings;

const DEFAULT_PORT: u16 = 5050;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Application configuration, read from the environment.
pub struct AppConfig {
    pub port: u16,
    pub debug: bool,
    /// External URL of this application (callback and logout return address).
    pub base_url: Url,
    pub oidc: OidcConfig,
    pub http: HttpClientConfig,
    pub roles_claim: ClaimPath,
    pub session: SessionSettings,
}

impl AppConfig {
    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `KEYCLOAK_BASE_URL`: identity provider base URL
    /// - `KEYCLOAK_REALM`: realm name; issuer is `{base}/realms/{realm}`
    /// - `KEYCLOAK_CLIENT_ID`, `KEYCLOAK_CLIENT_SECRET`: confidential client credentials
    ///
    /// # Optional env vars
    /// - `SESSION_SECRET`: cookie key material, at least 64 bytes (ephemeral key if unset)
    /// - `SESSION_TTL_HOURS`: session lifetime (default 8)
    /// - `APP_PORT`: listen port (default 5050)
    /// - `APP_DEBUG`: `"1"` or `"true"` for debug logging and dev-only TLS options
    /// - `APP_BASE_URL`: external URL (default `http://localhost:{port}`)
    /// - `OIDC_SCOPES`: space or comma separated scopes (default `openid profile email`)
    /// - `OIDC_ROLES_CLAIM`: dotted claim path of the roles (default `realm_access.roles`)
    /// - `OIDC_CA_BUNDLE`: PEM file with extra trusted CA certificates
    /// - `OIDC_INSECURE_SKIP_VERIFY`: skip TLS verification, honored only with `APP_DEBUG`
    /// - `OIDC_HTTP_TIMEOUT_SECS`: provider request timeout (default 10)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required variables are missing or values are invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| Error::Config(format!("{key} is required")));

        let debug = var("APP_DEBUG").is_some_and(|v| is_truthy(&v));
        let port = match var("APP_PORT") {
            Some(p) => p
                .parse()
                .map_err(|e| Error::Config(format!("APP_PORT: {e}")))?,
            None => DEFAULT_PORT,
        };
        let base_url: Url = var("APP_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .parse()
            .map_err(|e| Error::Config(format!("APP_BASE_URL: {e}")))?;

        let issuer = OidcConfig::keycloak_issuer(
            &required("KEYCLOAK_BASE_URL")?,
            &required("KEYCLOAK_REALM")?,
        )?;
        let mut oidc = OidcConfig::new(
            issuer,
            required("KEYCLOAK_CLIENT_ID")?,
            required("KEYCLOAK_CLIENT_SECRET")?,
        );
        if let Some(scopes) = var("OIDC_SCOPES") {
            oidc = oidc.with_scopes(
                scopes
                    .split([' ', ','])
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            );
        }

        let roles_claim = match var("OIDC_ROLES_CLAIM") {
            Some(path) => path.parse()?,
            None => ClaimPath::default(),
        };

        let mut http = HttpClientConfig::default();
        if let Some(secs) = var("OIDC_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::Config(format!("OIDC_HTTP_TIMEOUT_SECS: {e}")))?;
            http = http.with_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = var("OIDC_CA_BUNDLE") {
            http = http.with_ca_bundle(path);
        }
        if var("OIDC_INSECURE_SKIP_VERIFY").is_some_and(|v| is_truthy(&v)) {
            if debug {
                http = http.with_accept_invalid_certs(true);
            } else {
                tracing::warn!("OIDC_INSECURE_SKIP_VERIFY ignored: only allowed with APP_DEBUG");
            }
        }

        let cookie_key = match var("SESSION_SECRET") {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
                Error::Config(
                    "SESSION_SECRET is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => {
                tracing::warn!("SESSION_SECRET not set; sessions will not survive a restart");
                Key::generate()
            }
        };
        let mut session = SessionSettings::new(cookie_key)
            .with_secure_cookies(base_url.scheme() == "https");
        if let Some(hours) = var("SESSION_TTL_HOURS") {
            let hours: i64 = hours
                .parse()
                .map_err(|e| Error::Config(format!("SESSION_TTL_HOURS: {e}")))?;
            if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
                return Err(Error::Config(format!(
                    "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}"
                )));
            }
            session = session.with_ttl(time::Duration::hours(hours));
        }

        Ok(Self {
            port,
            debug,
            base_url,
            oidc,
            http,
            roles_claim,
            session,
        })
    }

    /// Listen on all interfaces.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Route configuration for a discovered client.
    #[must_use]
    pub fn auth_config(&self, client: OidcClient) -> AuthConfig {
        AuthConfig::new(client, self.base_url.clone()).with_roles_claim(self.roles_claim.clone())
    }
}

/// Whether `APP_DEBUG` is set, for use before the full configuration is loaded.
#[must_use]
pub fn debug_requested() -> bool {
    std::env::var("APP_DEBUG").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
