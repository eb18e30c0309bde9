use url::Url;

use crate::id_token::ClaimPath;
use crate::oidc::OidcClient;

pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/auth/callback";
pub const LOGOUT_PATH: &str = "/logout";
/// Landing page after login when no usable `next` was given.
pub const DEFAULT_REDIRECT: &str = "/dashboard";

/// Shared auth settings used by both config and runtime state.
#[derive(Debug, Clone)]
pub(crate) struct AuthSettings {
    /// External URL of this application, always ending in `/`.
    pub(crate) base_url: Url,
    pub(crate) roles_claim: ClaimPath,
}

impl AuthSettings {
    fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.set_query(None);
        base_url.set_fragment(None);

        Self {
            base_url,
            roles_claim: ClaimPath::default(),
        }
    }

    /// Absolute callback URL registered with the provider.
    pub(crate) fn callback_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "{}{}",
            self.base_url.path().trim_end_matches('/'),
            CALLBACK_PATH
        ));
        url
    }

    /// Where to send the browser after a successful login.
    ///
    /// `next` is honored when it resolves to this application's origin, and is
    /// returned as path and query only. Anything else falls back to
    /// [`DEFAULT_REDIRECT`].
    pub(crate) fn post_login_target(&self, next: Option<&str>) -> String {
        next.and_then(|n| safe_next(n, &self.base_url))
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_owned())
    }
}

fn safe_next(next: &str, base_url: &Url) -> Option<String> {
    let next = next.trim();
    // Browsers drop tabs and newlines when resolving `Location`; never echo them.
    if next.is_empty() || next.chars().any(char::is_control) {
        return None;
    }
    if !next.starts_with('/') && Url::parse(next).is_err() {
        return None;
    }

    let resolved = base_url.join(next).ok()?;
    if resolved.origin() != base_url.origin() {
        return None;
    }
    let mut target = resolved.path().to_owned();
    if let Some(query) = resolved.query() {
        target.push('?');
        target.push_str(query);
    }
    Some(target)
}

/// Configuration of the login/callback/logout routes.
///
/// Required fields (`client`, `base_url`) are constructor parameters.
///
/// ```rust,ignore
/// let config = AuthConfig::new(client, "https://app.example.com".parse()?)
///     .with_roles_claim("resource_access.my-app.roles".parse()?);
/// ```
pub struct AuthConfig {
    pub(super) client: OidcClient,
    pub(super) settings: AuthSettings,
}

impl AuthConfig {
    #[must_use]
    pub fn new(client: OidcClient, base_url: Url) -> Self {
        Self {
            client,
            settings: AuthSettings::new(base_url),
        }
    }

    /// Claim holding the user's roles (default `realm_access.roles`).
    #[must_use]
    pub fn with_roles_claim(mut self, path: ClaimPath) -> Self {
        self.settings.roles_claim = path;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.settings.base_url
    }
}
