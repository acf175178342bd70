//! User management module
//!
//! Admin-facing user administration endpoints plus self-service profile
//! updates.

pub mod api;

pub use api::{UserApiError, UserApiState, user_api_router};
