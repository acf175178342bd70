//! JWT utilities for token generation and validation
//!
//! Provides JWT token creation and validation using HS256 algorithm.
//! Access tokens are short-lived (15 minutes), refresh tokens are long-lived
//! (7 days). Refresh tokens carry a unique `jti` claim used as the blacklist
//! key on logout; access tokens carry no `jti`.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default access token expiration time (15 minutes)
const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| JwtError::MissingSecret)?;

        let access_exp = std::env::var("JWT_ACCESS_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ACCESS_TOKEN_EXPIRATION_MINUTES);

        let refresh_exp = std::env::var("JWT_REFRESH_EXPIRATION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(REFRESH_TOKEN_EXPIRATION_DAYS);

        Ok(Self {
            secret,
            access_token_expiration_minutes: access_exp,
            refresh_token_expiration_days: refresh_exp,
        })
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Token signature invalid")]
    InvalidSignature,

    #[error("Token malformed")]
    Malformed,

    #[error("Unexpected token type")]
    WrongTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => JwtError::InvalidSignature,
            _ => JwtError::Malformed,
        }
    }
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims structure
///
/// Access tokens omit `jti` entirely; refresh tokens always carry one.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID, the blacklist key (refresh tokens only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

impl Claims {
    /// Check if this is an access token
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    /// Check if this is a refresh token
    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::Malformed)
    }

    /// Get the JWT ID, failing if the token carries none
    pub fn require_jti(&self) -> Result<Uuid, JwtError> {
        self.jti.ok_or(JwtError::Malformed)
    }
}

/// Token pair returned on login: `{refresh, access}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Refresh token (long-lived)
    pub refresh: String,
    /// Access token (short-lived)
    pub access: String,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Create JWT service from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let config = JwtConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.access_token_expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: None,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate a refresh token for a user with a fresh random jti
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.config.refresh_token_expiration_days);

        let claims = Claims {
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Some(Uuid::new_v4()),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate both refresh and access tokens
    pub fn generate_token_pair(&self, user_id: Uuid) -> Result<TokenPair, JwtError> {
        let refresh = self.generate_refresh_token(user_id)?;
        let access = self.generate_access_token(user_id)?;

        Ok(TokenPair { refresh, access })
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Validate an access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if !claims.is_access_token() {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Validate a refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if !claims.is_refresh_token() {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Get the refresh token expiration in days
    pub fn refresh_token_expiration_days(&self) -> i64 {
        self.config.refresh_token_expiration_days
    }
}
