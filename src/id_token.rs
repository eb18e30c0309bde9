use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Clock skew tolerated on `exp`/`nbf`/`iat`, in seconds.
pub const LEEWAY_SECS: u64 = 60;

/// Dotted path to a claim inside the ID token, e.g. `realm_access.roles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPath(Vec<String>);

impl ClaimPath {
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

/// Keycloak's realm roles claim.
impl Default for ClaimPath {
    fn default() -> Self {
        Self(vec!["realm_access".into(), "roles".into()])
    }
}

impl FromStr for ClaimPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = s.trim().split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::Config(format!("invalid claim path: '{s}'")));
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for ClaimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Claims of an ID token whose signature, issuer, audience, expiry and nonce
/// have been verified.
#[derive(Debug, Clone)]
pub struct IdTokenClaims {
    inner: Map<String, JsonValue>,
}

impl IdTokenClaims {
    /// Wrap an already-trusted claims object.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if `value` is not a JSON object.
    pub fn from_value(value: JsonValue) -> Result<Self, Error> {
        match value {
            JsonValue::Object(inner) => Ok(Self { inner }),
            _ => Err(Error::Token("claims must be a JSON object".into())),
        }
    }

    /// Gets a top-level claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets a top-level string claim; non-string values are treated as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(JsonValue::as_str)
    }

    /// Follows a nested claim path.
    #[must_use]
    pub fn lookup(&self, path: &ClaimPath) -> Option<&JsonValue> {
        let (first, rest) = path.segments().split_first()?;
        rest.iter()
            .try_fold(self.inner.get(first)?, |value, segment| value.get(segment))
    }

    /// String entries of the array at `path`. Anything else yields an empty set.
    #[must_use]
    pub fn roles(&self, path: &ClaimPath) -> BTreeSet<String> {
        self.lookup(path)
            .and_then(JsonValue::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Values the ID token must carry to be accepted.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClaims<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
    /// Nonce stored in the session when the login started.
    pub nonce: &'a str,
}

/// Reads the signing algorithm and key id from the token header without verifying it.
///
/// # Errors
///
/// Returns `Error::Token` if the header cannot be decoded.
pub fn peek_header(token: &str) -> Result<(Algorithm, Option<String>), Error> {
    let header = jsonwebtoken::decode_header(token)?;
    Ok((header.alg, header.kid))
}

/// Verifies an OIDC ID token.
///
/// Checks the signature with `key`, `exp` (with [`LEEWAY_SECS`]), `iss`, `aud`,
/// `azp` when several audiences are present, and that the `nonce` claim equals
/// the expected nonce.
///
/// # Errors
///
/// Returns `Error::Token` for signature or claim failures and `Error::Nonce`
/// when the nonce is missing or does not match.
pub fn verify_id_token(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    expected: &ExpectedClaims<'_>,
) -> Result<IdTokenClaims, Error> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = LEEWAY_SECS;
    validation.set_issuer(&[expected.issuer]);
    validation.set_audience(&[expected.audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let data = jsonwebtoken::decode::<Map<String, JsonValue>>(token, key, &validation)?;
    let claims = IdTokenClaims { inner: data.claims };

    check_authorized_party(&claims, expected.audience)?;
    check_nonce(&claims, expected.nonce)?;

    Ok(claims)
}

fn check_authorized_party(claims: &IdTokenClaims, client_id: &str) -> Result<(), Error> {
    let multiple_audiences = claims
        .get_claim("aud")
        .and_then(JsonValue::as_array)
        .is_some_and(|aud| aud.len() > 1);

    match claims.get_str("azp") {
        Some(azp) if azp != client_id => Err(Error::Token(format!(
            "azp: expected '{client_id}', got '{azp}'"
        ))),
        None if multiple_audiences => Err(Error::Token("missing claim: azp".into())),
        _ => Ok(()),
    }
}

fn check_nonce(claims: &IdTokenClaims, expected: &str) -> Result<(), Error> {
    match claims.get_str("nonce") {
        Some(actual) if !expected.is_empty() && actual == expected => Ok(()),
        _ => Err(Error::Nonce),
    }
}
