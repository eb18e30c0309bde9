#![doc = include_str!("../README.md")]

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod id_token;
pub mod middleware;
pub mod oidc;
pub mod pages;
pub mod random;
pub mod session;
pub mod types;
pub mod well_known;

// Re-exports for convenient access
pub use config::AppConfig;
pub use error::Error;
pub use http::HttpClientConfig;
pub use id_token::{ClaimPath, IdTokenClaims};
pub use oidc::{OidcClient, OidcConfig, TokenResponse};
pub use types::{SessionId, TokenBundle, User};
pub use well_known::ProviderMetadata;
