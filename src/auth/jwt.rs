//! JWT access token validation
//!
//! Tokens are minted by the identity provider; this service only verifies them.
//! `generate_access_token` exists for tooling and tests that need a signed token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Actor, Role};

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    /// `operator` or `admin`
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Acting user named by these claims
    pub fn actor(&self) -> Result<Actor, JwtError> {
        let user_id = Uuid::parse_str(&self.sub)
            .map_err(|e| JwtError::InvalidToken(format!("bad subject: {}", e)))?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(JwtError::InvalidToken)?;

        Ok(Actor {
            user_id,
            username: self.username.clone(),
            role,
        })
    }
}

/// Sign an access token for `actor`
pub fn generate_access_token(
    actor: &Actor,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, JwtError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(ttl_seconds);

    let claims = Claims {
        sub: actor.user_id.to_string(),
        username: actor.username.clone(),
        role: actor.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        _ => JwtError::DecodingFailed(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// Shared-secret verifier held in application state
#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, JwtError> {
        verify_token(token, &self.secret)?.actor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: "cajero1".to_string(),
            role: Role::Operator,
        }
    }

    #[test]
    fn test_token_round_trip_yields_actor() {
        let actor = operator();
        let token = generate_access_token(&actor, "test-secret-key", 900).unwrap();

        let verified = TokenVerifier::new("test-secret-key").verify(&token).unwrap();
        assert_eq!(verified, actor);
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here", "test-secret-key");
        assert!(matches!(result, Err(JwtError::DecodingFailed(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let token = generate_access_token(&operator(), "secret1", 900).unwrap();
        assert!(verify_token(&token, "secret2").is_err());
    }

    #[test]
    fn test_expired_token() {
        let token = generate_access_token(&operator(), "secret1", -3600).unwrap();
        assert!(matches!(verify_token(&token, "secret1"), Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            username: "x".to_string(),
            role: "superuser".to_string(),
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.actor(), Err(JwtError::InvalidToken(_))));
    }
}
