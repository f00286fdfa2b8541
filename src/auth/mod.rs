pub mod password;
pub mod role;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;

pub use password::{hash_password, verify_password};
pub use role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub role: Role,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: Uuid, church_id: Option<Uuid>, branch_id: Option<Uuid>, role: Role, email: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            church_id,
            branch_id,
            role,
            email,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    Expired,
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
    #[error("{0}")]
    WeakPassword(String),
    #[error("Role '{0}' may not perform this action")]
    Forbidden(Role),
}

/// Gate for handlers: the caller's role must be one of `allowed`.
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(role))
    }
}

fn secret() -> Result<&'static str, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(secret.as_str())
}

pub fn generate_jwt(claims: &Claims) -> Result<String, AuthError> {
    let encoding_key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, AuthError> {
    decode_jwt(token, true)
}

/// Decode a token whose signature is valid but which may be past `exp`.
/// Used by the refresh flow, which applies its own window.
pub fn decode_jwt_allow_expired(token: &str) -> Result<Claims, AuthError> {
    decode_jwt(token, false)
}

fn decode_jwt(token: &str, validate_exp: bool) -> Result<Claims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret()?.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = validate_exp;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> Claims {
        Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), None, role, "pastor@example.org".to_string())
    }

    #[test]
    fn token_round_trip_keeps_claims() {
        let original = claims(Role::Pastor);
        let token = generate_jwt(&original).unwrap();
        let decoded = validate_jwt(&token).unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.church_id, original.church_id);
        assert_eq!(decoded.role, Role::Pastor);
    }

    #[test]
    fn expired_token_rejected_but_decodable_for_refresh() {
        let mut stale = claims(Role::Member);
        stale.iat -= 10 * 3600;
        stale.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt(&stale).unwrap();

        assert!(matches!(validate_jwt(&token), Err(AuthError::Expired)));
        assert_eq!(decode_jwt_allow_expired(&token).unwrap().sub, stale.sub);
    }

    #[test]
    fn role_gate() {
        assert!(require_role(Role::Pastor, &Role::PASTORAL).is_ok());
        assert!(matches!(require_role(Role::Member, &Role::PASTORAL), Err(AuthError::Forbidden(Role::Member))));
        assert!(require_role(Role::Bishop, &Role::ADMINS).is_err());
    }

    #[test]
    fn tampered_token_rejected() {
        let token = generate_jwt(&claims(Role::Admin)).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(validate_jwt(&tampered), Err(AuthError::InvalidToken(_))));
    }
}
