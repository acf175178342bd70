//! Database repositories for CertForge
//!
//! This module provides repository implementations for database operations.
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with the database.

pub mod blacklist;
pub mod certification;
pub mod competency;
pub mod exam_session;
pub mod user;

pub use blacklist::{BlacklistRepository, BlacklistRepositoryError};
pub use certification::{CertificationRepository, CertificationRepositoryError};
pub use competency::{CompetencyRepository, CompetencyRepositoryError};
pub use exam_session::{ExamSessionRepository, ExamSessionRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
