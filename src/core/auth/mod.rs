//! Authentication module for CertForge
//!
//! This module provides authentication functionality including:
//! - JWT token generation and validation
//! - User registration and login
//! - Refresh token revocation (logout)
//! - Password reset by mail
//! - REST API endpoints for auth operations

pub mod api;
pub mod extract;
pub mod jwt;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use extract::{AuthFailure, Authenticator, extract_bearer_token};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenPair, TokenType};
pub use service::{
    AuthError, AuthService, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
    ResetPasswordRequest, ResetPasswordResponse,
};
