#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider answered an OAuth2/OIDC request with a non-success status.
    #[error("{operation} failed (status {status:?}): {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Discovery error: {0}")]
    Discovery(String),
    #[error("Token verification error: {0}")]
    Token(String),
    #[error("nonce validation failed")]
    Nonce,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Token(e.to_string())
    }
}
