//! Outbound mail delivery
//!
//! Password resets send the generated password out-of-band through an HTTP
//! mail API. When no API credentials are configured the mailer falls back to
//! log mode, which records the delivery attempt without the message body so
//! generated passwords never reach the logs.

use serde::Serialize;
use std::time::Duration;

/// Default per-send timeout (seconds)
const MAIL_TIMEOUT_SECS: u64 = 10;

/// Mail API configuration loaded from environment
#[derive(Clone)]
pub struct MailConfig {
    pub api_base: String,
    pub api_token: Option<String>,
    pub from_address: String,
    pub timeout_secs: u64,
}

impl MailConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("MAIL_API_BASE").unwrap_or_default(),
            api_token: std::env::var("MAIL_API_TOKEN").ok(),
            from_address: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@certforge.app".to_string()),
            timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAIL_TIMEOUT_SECS),
        }
    }

    /// Check if both the API endpoint and token are configured
    pub fn is_configured(&self) -> bool {
        !self.api_base.is_empty() && self.api_token.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Mail API returned status {status}: {body}")]
    ApiError { status: u16, body: String },
}

/// Outgoing message payload
#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mail sender
///
/// `Api` posts messages to the configured HTTP mail API. `Log` only records
/// recipient and subject, for local development without credentials.
#[derive(Clone)]
pub enum Mailer {
    Api {
        client: reqwest::Client,
        config: MailConfig,
    },
    Log,
}

impl Mailer {
    /// Create a mailer from environment variables
    ///
    /// Falls back to log mode when MAIL_API_BASE or MAIL_API_TOKEN is unset.
    pub fn from_env() -> Self {
        let config = MailConfig::from_env();

        if config.is_configured() {
            Self::Api {
                client: reqwest::Client::new(),
                config,
            }
        } else {
            tracing::warn!("MAIL_API_BASE/MAIL_API_TOKEN not set, mail runs in log mode");
            Self::Log
        }
    }

    /// Send a message, failing hard on any delivery problem
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        match self {
            Self::Api { client, config } => {
                let payload = MailPayload {
                    from: &config.from_address,
                    to,
                    subject,
                    text: body,
                };

                let token = config.api_token.as_deref().unwrap_or_default();

                let response = client
                    .post(&config.api_base)
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .header("Authorization", format!("Bearer {}", token))
                    .json(&payload)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    tracing::error!("Mail API error response: {}", body);
                    return Err(MailError::ApiError {
                        status: status.as_u16(),
                        body,
                    });
                }

                tracing::info!("Mail sent to {}: {}", to, subject);
                Ok(())
            }
            Self::Log => {
                tracing::info!("Mail (log mode) to {}: {}", to, subject);
                Ok(())
            }
        }
    }

    /// Check if this mailer actually delivers mail
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_config(base: &str, token: Option<&str>) -> MailConfig {
        MailConfig {
            api_base: base.to_string(),
            api_token: token.map(|t| t.to_string()),
            from_address: "no-reply@certforge.app".to_string(),
            timeout_secs: MAIL_TIMEOUT_SECS,
        }
    }

    #[test]
    fn test_mail_config_is_configured() {
        assert!(api_config("https://mail.example/send", Some("token")).is_configured());
        assert!(!api_config("", Some("token")).is_configured());
        assert!(!api_config("https://mail.example/send", None).is_configured());
        assert!(!api_config("https://mail.example/send", Some("")).is_configured());
    }

    #[test]
    fn test_mail_config_from_env_defaults() {
        let base_orig = std::env::var("MAIL_API_BASE").ok();
        let token_orig = std::env::var("MAIL_API_TOKEN").ok();
        let from_orig = std::env::var("MAIL_FROM").ok();
        // SAFETY: test environment
        unsafe {
            std::env::remove_var("MAIL_API_BASE");
            std::env::remove_var("MAIL_API_TOKEN");
            std::env::remove_var("MAIL_FROM");
        }

        let config = MailConfig::from_env();
        assert_eq!(config.api_base, "");
        assert_eq!(config.api_token, None);
        assert_eq!(config.from_address, "no-reply@certforge.app");
        assert_eq!(config.timeout_secs, MAIL_TIMEOUT_SECS);
        assert!(!config.is_configured());

        // SAFETY: test environment
        unsafe {
            if let Some(v) = base_orig {
                std::env::set_var("MAIL_API_BASE", v);
            }
            if let Some(v) = token_orig {
                std::env::set_var("MAIL_API_TOKEN", v);
            }
            if let Some(v) = from_orig {
                std::env::set_var("MAIL_FROM", v);
            }
        }
    }

    #[test]
    fn test_mailer_liveness() {
        let api = Mailer::Api {
            client: reqwest::Client::new(),
            config: api_config("https://mail.example/send", Some("token")),
        };

        assert!(api.is_live());
        assert!(!Mailer::Log.is_live());
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = Mailer::Log;

        let result = mailer
            .send("user@example.com", "Password reset", "your new password")
            .await;

        assert!(result.is_ok());
    }

    #[test]
    fn test_mail_payload_serialization() {
        let payload = MailPayload {
            from: "no-reply@certforge.app",
            to: "user@example.com",
            subject: "Password reset",
            text: "hello",
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""from":"no-reply@certforge.app""#));
        assert!(json.contains(r#""to":"user@example.com""#));
        assert!(json.contains(r#""subject":"Password reset""#));
        assert!(json.contains(r#""text":"hello""#));
    }

    #[test]
    fn test_mail_error_display() {
        let err = MailError::ApiError {
            status: 502,
            body: "upstream unavailable".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Mail API returned status 502: upstream unavailable"
        );
    }
}
