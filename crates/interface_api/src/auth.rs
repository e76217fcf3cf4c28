//! Authentication and authorization
//!
//! Bearer tokens are HS256 JWTs whose subject is a user UUID. The roles
//! claim decides the [`Actor`] the ledger services see; role checks
//! themselves happen in the services.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::UserId;
use domain_ledger::{Actor, ActorRole};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// User's roles, e.g. `["ACCOUNTANT"]`
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a user id")]
    InvalidSubject,
    #[error("Token carries no recognized role")]
    NoRecognizedRole,
}

/// Creates a signed token for a user
pub fn create_token(
    user_id: UserId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.as_uuid().to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a token's signature and expiry
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Resolves the acting user from validated claims
///
/// With several roles the most privileged one wins. Unknown role strings
/// are ignored.
pub fn actor_from_claims(claims: &Claims) -> Result<Actor, AuthError> {
    let id = Uuid::parse_str(&claims.sub)
        .map(UserId::from)
        .map_err(|_| AuthError::InvalidSubject)?;

    let role = claims
        .roles
        .iter()
        .filter_map(|r| r.parse::<ActorRole>().ok())
        .min_by_key(|role| privilege_rank(*role))
        .ok_or(AuthError::NoRecognizedRole)?;

    Ok(Actor::new(id, role))
}

fn privilege_rank(role: ActorRole) -> u8 {
    match role {
        ActorRole::Admin => 0,
        ActorRole::Accountant => 1,
        ActorRole::ProjectManager => 2,
        ActorRole::Staff => 3,
    }
}
