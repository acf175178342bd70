//! Database models for CertForge
//!
//! This module defines the database entity structs that map to PostgreSQL tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Helper module for deserializing Option<Option<T>> where:
/// - Missing field -> None (don't update)
/// - Field with null -> Some(None) (set to null)
/// - Field with value -> Some(Some(value)) (set to value)
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        // This will be called only when the field is present
        // So we wrap the result in Some()
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// ============================================================================
// User Model
// ============================================================================

/// User entity representing a registered account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Staff accounts pass admin-only permission checks
    pub fn is_admin(&self) -> bool {
        self.is_staff
    }
}

/// User data for creation (without id and timestamps)
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// User data for updates; None fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Compact projection for the admin user listing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserListItem {
    pub id: Uuid,
    pub username: String,
}

/// Admin-facing user detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetail {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserDetail {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            last_login: user.last_login,
        }
    }
}

// ============================================================================
// Token Blacklist Model
// ============================================================================

/// A revoked refresh token, keyed by its jti claim
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlacklistEntry {
    pub id: Uuid,
    pub jti: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub blacklisted_at: DateTime<Utc>,
}

// ============================================================================
// Certification Model
// ============================================================================

/// Certification entity from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certification {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Certification data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCertification {
    pub name: String,
    pub description: Option<String>,
}

/// Certification data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateCertification {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>, // None = don't update, Some(None) = set to null
}

/// Certification with its associated competencies (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationWithCompetencies {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub competencies: Vec<Competency>,
}

impl CertificationWithCompetencies {
    pub fn new(certification: Certification, competencies: Vec<Competency>) -> Self {
        Self {
            id: certification.id,
            name: certification.name,
            description: certification.description,
            competencies,
        }
    }
}

// ============================================================================
// Competency Model
// ============================================================================

/// Competency entity, linkable to any number of certifications
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Competency {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Competency data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompetency {
    pub name: String,
    pub description: Option<String>,
}

/// Competency data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateCompetency {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
}

// ============================================================================
// Exam Session Model
// ============================================================================

/// One exam attempt; completed_at and score are set exactly once
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub certification_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

impl ExamSession {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "super_secret_hash".to_string(),
            is_staff: false,
            is_superuser: false,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let user = sample_user();

        let json = serde_json::to_string(&user).unwrap();

        // password_hash should be skipped during serialization
        assert!(!json.contains("super_secret_hash"));
        assert!(!json.contains("password_hash"));
        assert!(json.contains("test@example.com"));
        assert!(json.contains("testuser"));
    }

    #[test]
    fn test_user_response_from_user() {
        let user = sample_user();

        let response: UserResponse = user.clone().into();

        assert_eq!(response.id, user.id);
        assert_eq!(response.username, user.username);
        assert_eq!(response.email, user.email);
    }

    #[test]
    fn test_user_response_excludes_sensitive_fields() {
        let user = sample_user();

        let response: UserResponse = user.into();
        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("super_secret_hash"));
        assert!(!json.contains("is_superuser"));
        assert!(json.contains("test@example.com"));
    }

    #[test]
    fn test_user_detail_carries_last_login() {
        let mut user = sample_user();
        user.last_login = Some(Utc::now());

        let detail: UserDetail = user.clone().into();

        assert_eq!(detail.last_login, user.last_login);
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("last_login"));
    }

    #[test]
    fn test_user_detail_serializes_null_last_login() {
        let detail: UserDetail = sample_user().into();

        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("\"last_login\":null"));
    }

    #[test]
    fn test_is_admin_follows_is_staff() {
        let mut user = sample_user();
        assert!(!user.is_admin());

        user.is_staff = true;
        assert!(user.is_admin());
    }

    #[test]
    fn test_update_certification_missing_description() {
        let update: UpdateCertification = serde_json::from_str(r#"{"name": "AWS SAA"}"#).unwrap();

        assert_eq!(update.name, Some("AWS SAA".to_string()));
        assert!(update.description.is_none()); // field absent -> don't touch
    }

    #[test]
    fn test_update_certification_null_description() {
        let update: UpdateCertification =
            serde_json::from_str(r#"{"description": null}"#).unwrap();

        assert!(update.name.is_none());
        assert_eq!(update.description, Some(None)); // explicit null -> clear
    }

    #[test]
    fn test_update_certification_with_description() {
        let update: UpdateCertification =
            serde_json::from_str(r#"{"description": "Cloud architect track"}"#).unwrap();

        assert_eq!(
            update.description,
            Some(Some("Cloud architect track".to_string()))
        );
    }

    #[test]
    fn test_certification_with_competencies_new() {
        let certification = Certification {
            id: Uuid::new_v4(),
            name: "Kubernetes Administrator".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let competency = Competency {
            id: Uuid::new_v4(),
            name: "Cluster networking".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let combined =
            CertificationWithCompetencies::new(certification.clone(), vec![competency]);

        assert_eq!(combined.id, certification.id);
        assert_eq!(combined.name, certification.name);
        assert_eq!(combined.competencies.len(), 1);
    }

    #[test]
    fn test_exam_session_is_completed() {
        let mut session = ExamSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            certification_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            score: None,
        };

        assert!(!session.is_completed());

        session.completed_at = Some(Utc::now());
        session.score = Some(87.5);
        assert!(session.is_completed());
    }

    #[test]
    fn test_exam_session_serializes_null_score() {
        let session = ExamSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            certification_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            score: None,
        };

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"score\":null"));
        assert!(json.contains("\"completed_at\":null"));
    }
}
