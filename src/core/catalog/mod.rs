//! Certification catalog module
//!
//! Certifications and competencies, plus the association between them.

pub mod api;

pub use api::{CatalogApiError, CatalogApiState, catalog_api_router};
