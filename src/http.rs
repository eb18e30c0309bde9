use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Transport settings for the HTTP client used to talk to the identity provider.
///
/// Certificate trust lives here and only here: the built client is handed to
/// [`OidcClient`](crate::oidc::OidcClient) and is never shared with anything else.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub(crate) timeout: Duration,
    pub(crate) ca_bundle: Option<PathBuf>,
    pub(crate) accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            ca_bundle: None,
            accept_invalid_certs: false,
        }
    }
}

impl HttpClientConfig {
    /// Per-request timeout (connect + response).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Trust an additional PEM CA bundle (e.g. a corporate root).
    #[must_use]
    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    /// Skip certificate verification. Development only.
    #[must_use]
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a dedicated `reqwest::Client` from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the CA bundle cannot be read or parsed,
    /// or [`Error::Http`] if the client cannot be constructed.
    pub fn build(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("realm-gate/", env!("CARGO_PKG_VERSION")));

        if let Some(path) = &self.ca_bundle {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Config(format!("CA bundle {}: {e}", path.display())))?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem)
                .map_err(|e| Error::Config(format!("CA bundle {}: {e}", path.display())))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
            tracing::info!(path = %path.display(), "Using custom CA bundle for identity provider");
        }

        if self.accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled for identity provider");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(Into::into)
    }
}
