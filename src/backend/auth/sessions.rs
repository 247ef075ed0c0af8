/**
 * Session Gate and JWT Tokens
 *
 * This module verifies bearer credentials and yields the account id they
 * were issued for. Registration and login live outside this service; the
 * only thing the chat core needs is `verify(token) -> account id`.
 */

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::backend::error::BackendError;
use crate::backend::messaging::identity::validate_account_id;

/// Lifetime of tokens issued by `create_token`
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Verifies a bearer credential and yields the authenticated account id
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, BackendError>;
}

/// HS256 session gate backed by a shared secret
#[derive(Clone)]
pub struct JwtSessionGate {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionGate {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify and decode a JWT token
    pub fn verify_claims(&self, token: &str) -> Result<Claims, BackendError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                BackendError::unauthorized("invalid or expired token")
            })?;
        Ok(token_data.claims)
    }
}

#[async_trait]
impl SessionGate for JwtSessionGate {
    async fn verify(&self, token: &str) -> Result<String, BackendError> {
        let claims = self.verify_claims(token)?;
        validate_account_id(&claims.sub).map_err(|_| {
            tracing::warn!("Token subject is not a valid account id");
            BackendError::unauthorized("invalid token subject")
        })?;
        Ok(claims.sub)
    }
}

/// Create a JWT token for an account
///
/// # Arguments
/// * `secret` - HS256 secret shared with the verifying gate
/// * `account_id` - Account the token is issued for
/// * `ttl` - Token lifetime
pub fn create_token(
    secret: &str,
    account_id: &str,
    ttl: Duration,
) -> Result<String, BackendError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account_id.to_string(),
        exp: (now + ttl).timestamp().max(0) as u64,
        iat: now.timestamp().max(0) as u64,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| BackendError::internal(format!("failed to sign token: {}", e)))
}
