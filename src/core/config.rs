//! Application configuration from environment variables.
//!
//! Load configuration using `AppConfig::from_env()` after calling `dotenvy::dotenv()`.

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    /// Example: 127.0.0.1:8000
    pub bind_addr: String,

    /// Debug mode. When enabled, password-reset responses echo the
    /// generated password back to the caller.
    pub debug: bool,

    /// Allowed CORS origin. When unset, any origin is accepted.
    pub cors_origin: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            debug: std::env::var("DEBUG")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            cors_origin: std::env::var("CORS_ALLOWED_ORIGIN").ok(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Check if a specific CORS origin is configured
    pub fn has_cors_origin(&self) -> bool {
        self.cors_origin.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            debug: false,
            cors_origin: None,
            request_timeout_secs: 30,
        }
    }
}

/// Interpret common truthy spellings ("1", "true", "yes", "on").
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
