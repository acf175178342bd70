//! Exam session module
//!
//! Exam attempts against catalog certifications, scored exactly once.

pub mod api;

pub use api::{ExamApiError, ExamApiState, exam_api_router};
