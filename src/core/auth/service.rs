//! Authentication service
//!
//! Business logic for login, token refresh, logout (refresh-token
//! revocation), password reset, and registration. Coordinates the user
//! repository, the blacklist repository, the JWT service, and the mailer.

use chrono::DateTime;
use rand::{Rng, distributions::Alphanumeric};

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::db::models::UserResponse;
use crate::core::db::repositories::blacklist::{BlacklistRepository, BlacklistRepositoryError};
use crate::core::db::repositories::user::{UserRepository, UserRepositoryError};
use crate::core::mail::{MailError, Mailer};

/// Length of generated reset passwords
const RESET_PASSWORD_LENGTH: usize = 12;

/// Authentication service error types
///
/// Display strings are the caller-visible wire messages.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Token is blacklisted")]
    TokenBlacklisted,

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("Token is invalid or already expired.")]
    LogoutTokenInvalid,

    #[error("No user found with this email.")]
    EmailNotFound,

    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("This password is too short. It must contain at least 8 characters.")]
    PasswordTooShort,

    #[error("This password is entirely numeric.")]
    PasswordEntirelyNumeric,

    #[error("The password is too similar to the username.")]
    PasswordTooSimilar,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("An internal error has occurred.")]
    InternalError(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::EmailAlreadyExists => AuthError::EmailAlreadyExists,
            UserRepositoryError::UsernameAlreadyExists => AuthError::UsernameAlreadyExists,
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl From<BlacklistRepositoryError> for AuthError {
    fn from(err: BlacklistRepositoryError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired
            | JwtError::InvalidSignature
            | JwtError::Malformed
            | JwtError::WrongTokenType => AuthError::InvalidToken,
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl From<MailError> for AuthError {
    fn from(err: MailError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Refresh and logout request data, both carry the refresh token
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Registration request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Password reset request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
}

/// Refresh response: a new access token, the refresh token is not rotated
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Password reset response
///
/// `new_password` is exposed only when the service runs with the debug flag.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResetPasswordResponse {
    pub message: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    blacklist_repo: BlacklistRepository,
    jwt_service: JwtService,
    mailer: Mailer,
    debug: bool,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        user_repo: UserRepository,
        blacklist_repo: BlacklistRepository,
        jwt_service: JwtService,
        mailer: Mailer,
        debug: bool,
    ) -> Self {
        Self {
            user_repo,
            blacklist_repo,
            jwt_service,
            mailer,
            debug,
        }
    }

    /// Unwrap a required request field, treating blank values as absent
    fn require_field<'a>(
        value: Option<&'a str>,
        name: &'static str,
    ) -> Result<&'a str, AuthError> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingField(name))
    }

    /// Validate email format
    pub(crate) fn validate_email(email: &str) -> Result<(), AuthError> {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(AuthError::InvalidEmail);
        }

        let local = parts[0];
        let domain = parts[1];

        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(AuthError::InvalidEmail);
        }

        if domain.split('.').any(|p| p.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate password strength against the account's username
    fn validate_password(password: &str, username: &str) -> Result<(), AuthError> {
        if password.chars().count() < 8 {
            return Err(AuthError::PasswordTooShort);
        }

        if password.chars().all(|c| c.is_numeric()) {
            return Err(AuthError::PasswordEntirelyNumeric);
        }

        let lowered = password.to_lowercase();
        if !username.is_empty() && lowered.contains(&username.to_lowercase()) {
            return Err(AuthError::PasswordTooSimilar);
        }

        Ok(())
    }

    /// Generate a random alphanumeric password
    fn generate_password(length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length).map(|_| rng.sample(Alphanumeric) as char).collect()
    }

    /// Login with username and password, minting a token pair.
    ///
    /// Unknown username and wrong password produce the same error so callers
    /// cannot probe which accounts exist. Stamps `last_login` on success.
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, AuthError> {
        let username = Self::require_field(request.username.as_deref(), "Username")?;
        let password = Self::require_field(request.password.as_deref(), "Password")?;

        let user = self
            .user_repo
            .authenticate(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.user_repo.touch_last_login(user.id).await?;

        let tokens = self.jwt_service.generate_token_pair(user.id)?;

        Ok(tokens)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token must decode as type "refresh" and its jti must not
    /// be blacklisted. The user record is not consulted; a since-deleted
    /// user is rejected when the minted access token is presented.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<RefreshResponse, AuthError> {
        let token = Self::require_field(request.refresh.as_deref(), "Refresh token")?;

        let claims = self.jwt_service.validate_refresh_token(token)?;
        let jti = claims.require_jti()?;

        if self.blacklist_repo.is_blacklisted(jti).await? {
            return Err(AuthError::TokenBlacklisted);
        }

        let user_id = claims.user_id()?;
        let access = self.jwt_service.generate_access_token(user_id)?;

        Ok(RefreshResponse { access })
    }

    /// Revoke a refresh token.
    ///
    /// Any decode failure, including a jti that is already blacklisted, is
    /// reported as the same client error.
    pub async fn logout(&self, request: RefreshRequest) -> Result<(), AuthError> {
        let token = Self::require_field(request.refresh.as_deref(), "Refresh token")?;

        let claims = self
            .jwt_service
            .validate_refresh_token(token)
            .map_err(|err| match err {
                JwtError::MissingSecret | JwtError::EncodingError(_) => {
                    AuthError::InternalError(err.to_string())
                }
                _ => AuthError::LogoutTokenInvalid,
            })?;

        let jti = claims.require_jti().map_err(|_| AuthError::LogoutTokenInvalid)?;
        let user_id = claims.user_id().map_err(|_| AuthError::LogoutTokenInvalid)?;

        if self.blacklist_repo.is_blacklisted(jti).await? {
            return Err(AuthError::LogoutTokenInvalid);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
            AuthError::InternalError("refresh token carries an invalid expiry".to_string())
        })?;

        self.blacklist_repo.blacklist(jti, user_id, expires_at).await?;

        Ok(())
    }

    /// Replace a forgotten password with a generated one and mail it out.
    ///
    /// Mail failure is a hard error even though the password has already
    /// been changed at that point.
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<ResetPasswordResponse, AuthError> {
        let email = Self::require_field(request.email.as_deref(), "Email")?;
        Self::validate_email(email)?;

        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::EmailNotFound)?;

        let new_password = Self::generate_password(RESET_PASSWORD_LENGTH);

        self.user_repo
            .update_password(user.id, &new_password)
            .await?;

        self.mailer
            .send(
                &user.email,
                "Password reset",
                &format!(
                    "Hello {}, your new password is: {}",
                    user.username, new_password
                ),
            )
            .await?;

        Ok(ResetPasswordResponse {
            message: "A new password has been sent.".to_string(),
            username: user.username,
            new_password: self.debug.then_some(new_password),
        })
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        let username = Self::require_field(request.username.as_deref(), "Username")?;
        let email = Self::require_field(request.email.as_deref(), "Email")?;
        let password = Self::require_field(request.password.as_deref(), "Password")?;

        Self::validate_email(email)?;
        Self::validate_password(password, username)?;

        let user = self.user_repo.create(username, email, password).await?;

        Ok(user.into())
    }
}
