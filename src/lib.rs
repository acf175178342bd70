//! CertForge - Certification Exam Platform Backend
//!
//! A REST API for managing certification catalogs, exam sessions and the
//! accounts that take them, with JWT-based session handling backed by
//! PostgreSQL.

pub mod core;
