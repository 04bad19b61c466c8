//! # JWT Token Management
//!
//! Signed bearer tokens carrying a role claim.
//!
//! Claims are decoded once into [`TokenClaims`] at parse time; nothing
//! downstream inspects the raw token again except the command channel's
//! per-message re-check, which goes through [`TokenManager::validate_token`].

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::role::Role;

/// Claims carried by a gateway token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Role granted to the bearer
    pub role: Role,

    /// Optional subject (who the token was minted for)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,

    /// Audience (workspace)
    pub aud: String,

    /// Issuer
    pub iss: String,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,

    /// Issuer identifier
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Audience identifier
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_secret() -> String {
    "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string()
}

fn default_ttl_secs() -> i64 {
    60 * 60 * 24
}

fn default_issuer() -> String {
    "kernelgate".to_string()
}

fn default_audience() -> String {
    "kernelgate".to_string()
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            ttl_secs: default_ttl_secs(),
            issuer: default_issuer(),
            audience: default_audience(),
        }
    }
}

/// Issues and validates gateway tokens
#[derive(Clone)]
pub struct TokenManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token for `role` with the configured lifetime
    pub fn issue(&self, role: Role) -> AuthResult<String> {
        self.issue_with_ttl(role, None, Duration::seconds(self.config.ttl_secs))
    }

    /// Issue a token with an explicit subject and lifetime
    pub fn issue_with_ttl(
        &self,
        role: Role,
        sub: Option<String>,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            role,
            sub,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate a token: well-formed, correctly signed, not expired
    pub fn validate_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let token_data =
            decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}
