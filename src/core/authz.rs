//! Capability checks for endpoint handlers
//!
//! Role logic lives in one pure function so handlers state the action they
//! need instead of re-deriving flag checks inline.

use crate::core::db::models::User;

/// Actions a handler can require before touching a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Retrieve, update or delete another user's account
    ManageUsers,
    /// Create, update or delete certifications and competencies
    ManageCatalog,
    /// Read certifications and competencies
    ViewCatalog,
    /// Start an exam session for oneself
    StartExam,
    /// List exam sessions of all users
    ViewAllSessions,
}

/// Decide whether `user` may perform `action`.
///
/// Staff users hold every capability; regular users only the self-service
/// ones. Deciding ownership of a specific record stays with the handler.
pub fn authorize(user: &User, action: Action) -> bool {
    match action {
        Action::ManageUsers | Action::ManageCatalog | Action::ViewAllSessions => user.is_admin(),
        Action::ViewCatalog | Action::StartExam => true,
    }
}
