//! Credential issuing and verification (HS256 JWT)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::Role;
use crate::EcommerceError;

/// Why a credential was refused. Each kind maps to its own response code so clients can tell
/// "log in", "refresh" and "not allowed" apart.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token provided")]
    MissingCredential,
    #[error("Invalid token")]
    InvalidCredential,
    #[error("Token expired")]
    Expired,
    #[error("Access denied for this account type")]
    WrongRole,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::Expired => "credential_expired",
            Self::WrongRole => "wrong_role",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC secret, at least 32 bytes.
    pub secret: String,
    pub customer_ttl: Duration,
    pub seller_ttl: Duration,
    pub admin_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken { pub token: String, pub expires_at: DateTime<Utc> }

pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self { config, encoding_key, decoding_key }
    }

    pub fn lifetime(&self, role: Role) -> Duration {
        match role {
            Role::Customer => self.config.customer_ttl,
            Role::Seller => self.config.seller_ttl,
            Role::Admin => self.config.admin_ttl,
        }
    }

    pub fn issue(&self, id: Uuid, role: Role) -> Result<IssuedToken, EcommerceError> {
        self.issue_with_lifetime(id, role, self.lifetime(role))
    }

    /// Like [`TokenService::issue`] with an explicit lifetime; negative lifetimes yield already-expired credentials.
    pub fn issue_with_lifetime(&self, id: Uuid, role: Role, lifetime: Duration) -> Result<IssuedToken, EcommerceError> {
        let now = Utc::now();
        let expires_at = now + lifetime;
        let claims = Claims { sub: id, role, iat: now.timestamp(), exp: expires_at.timestamp() };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| EcommerceError::Internal(format!("token signing failed: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidCredential,
            })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> TokenConfig {
    TokenConfig {
        secret: "a-test-secret-that-is-long-enough-1234".into(),
        customer_ttl: Duration::days(7),
        seller_ttl: Duration::days(7),
        admin_ttl: Duration::days(1),
    }
}
