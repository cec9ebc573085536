//! Authentication hook for validating player identity.
//!
//! The gateway hands the bearer token from the upgrade request to an
//! [`Authenticator`] and gets back an [`Identity`]. Production uses
//! [`JwtAuthenticator`]; tests plug in something simpler.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use unotable_protocol::PlayerId;

use crate::SessionError;

/// Who a validated token says the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    pub display_name: String,
}

/// Validates a client's auth token and returns their identity.
///
/// # Example
///
/// ```rust
/// use unotable_protocol::PlayerId;
/// use unotable_session::{Authenticator, Identity, SessionError};
///
/// /// Uses the token itself as the player id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<Identity, SessionError> {
///         Ok(Identity {
///             player_id: PlayerId::from(token),
///             display_name: token.to_owned(),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// - `Err(SessionError::TokenExpired)`: the token was valid but is stale
    /// - `Err(SessionError::AuthFailed)`: anything else wrong with it
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// JwtAuthenticator
// ---------------------------------------------------------------------------

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Player id.
    pub sub: String,
    /// Display name. Falls back to `sub` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    pub exp: usize,
}

/// HS256 JWT validation against a shared secret.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    SessionError::TokenExpired
                }
                _ => SessionError::AuthFailed(e.to_string()),
            })?;

        let Claims { sub, name, .. } = data.claims;
        if sub.is_empty() {
            return Err(SessionError::AuthFailed("empty subject".into()));
        }
        let display_name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| sub.clone());

        Ok(Identity {
            player_id: PlayerId(sub),
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn now() -> usize {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
    }

    fn token(claims: &Claims, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_jwt_authenticate_valid_token_returns_identity() {
        let auth = JwtAuthenticator::new(SECRET);
        let claims = Claims {
            sub: "u-1".into(),
            name: Some("Alice".into()),
            exp: now() + 3600,
        };

        let identity = auth.authenticate(&token(&claims, SECRET)).await.unwrap();

        assert_eq!(identity.player_id, PlayerId::from("u-1"));
        assert_eq!(identity.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_jwt_authenticate_missing_name_uses_subject() {
        let auth = JwtAuthenticator::new(SECRET);
        let claims = Claims {
            sub: "u-2".into(),
            name: None,
            exp: now() + 3600,
        };

        let identity = auth.authenticate(&token(&claims, SECRET)).await.unwrap();

        assert_eq!(identity.display_name, "u-2");
    }

    #[tokio::test]
    async fn test_jwt_authenticate_expired_token_returns_token_expired() {
        let auth = JwtAuthenticator::new(SECRET);
        let claims = Claims {
            sub: "u-1".into(),
            name: None,
            exp: now() - 3600,
        };

        let result = auth.authenticate(&token(&claims, SECRET)).await;

        assert!(matches!(result, Err(SessionError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_jwt_authenticate_wrong_secret_fails() {
        let auth = JwtAuthenticator::new(SECRET);
        let claims = Claims {
            sub: "u-1".into(),
            name: None,
            exp: now() + 3600,
        };

        let result = auth.authenticate(&token(&claims, b"other")).await;

        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_jwt_authenticate_garbage_fails() {
        let auth = JwtAuthenticator::new(SECRET);
        let result = auth.authenticate("not-a-jwt").await;
        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }
}
