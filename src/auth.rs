//! Read-only visitor identity.
//!
//! Sign-in, sign-up and sign-out are handled entirely by the hosted identity
//! provider. This module only answers "is this request signed in, and as
//! whom?" by verifying the provider's session JWT, taken from the
//! `Authorization: Bearer` header or the `__session` cookie.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Cookie the identity provider stores its session token in.
pub const SESSION_COOKIE: &str = "__session";

/// Claims read from the provider's session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String, // User ID (Subject)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize, // Expiration time (UNIX timestamp)
}

/// Display fields of a signed-in visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    /// Best available label for the profile chip.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

impl From<UserClaims> for UserProfile {
    fn from(claims: UserClaims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
        }
    }
}

/// Auth status of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    SignedIn(UserProfile),
}

impl Identity {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::SignedIn(profile) => Some(profile),
            Self::Anonymous => None,
        }
    }
}

/// Verifies provider session tokens.
///
/// Without a configured key every request is anonymous.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("enabled", &self.key.is_some())
            .finish()
    }
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret
                .filter(|s| !s.trim().is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::default(),
        }
    }

    /// Decode and validate a token.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<UserProfile> {
        let key = self.key.as_ref()?;
        match decode::<UserClaims>(token, key, &self.validation) {
            Ok(data) => Some(data.claims.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }

    /// Resolve the identity carried by a request's headers.
    #[must_use]
    pub fn identify(&self, headers: &HeaderMap) -> Identity {
        let bearer = headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string());
        let token = bearer.or_else(|| {
            CookieJar::from_headers(headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
        });

        token
            .and_then(|t| self.verify(&t))
            .map_or(Identity::Anonymous, Identity::SignedIn)
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.verifier.identify(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(secret: &str, exp_offset: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset;
        let claims = UserClaims {
            sub: "user_42".to_string(),
            name: Some("Ada".to_string()),
            email: None,
            exp: usize::try_from(exp).unwrap(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_bearer_token() {
        let verifier = TokenVerifier::new(Some(SECRET));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token(SECRET, 3600)).parse().unwrap(),
        );

        let identity = verifier.identify(&headers);
        let profile = identity.profile().unwrap();
        assert_eq!(profile.id, "user_42");
        assert_eq!(profile.display_name(), "Ada");
    }

    #[test]
    fn test_session_cookie() {
        let verifier = TokenVerifier::new(Some(SECRET));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("theme=dark; {SESSION_COOKIE}={}", token(SECRET, 3600))
                .parse()
                .unwrap(),
        );
        assert!(verifier.identify(&headers).is_signed_in());
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let verifier = TokenVerifier::new(Some(SECRET));

        assert_eq!(verifier.verify(&token("other-secret", 3600)), None);
        assert_eq!(verifier.verify(&token(SECRET, -3600)), None);
        assert_eq!(verifier.verify("garbage"), None);
        assert_eq!(verifier.identify(&HeaderMap::new()), Identity::Anonymous);
    }

    #[test]
    fn test_no_key_means_anonymous() {
        let verifier = TokenVerifier::new(None);
        assert_eq!(verifier.verify(&token(SECRET, 3600)), None);
        let verifier = TokenVerifier::new(Some("  "));
        assert_eq!(verifier.verify(&token(SECRET, 3600)), None);
    }
}
