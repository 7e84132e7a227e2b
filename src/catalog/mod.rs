//! Title catalog and query engine.
//!
//! The catalog maps 64-bit title IDs to a display name and a region mask.
//! Platform, kind and packaging format are derived from the ID itself.
//!
//! # Catalog document
//!
//! ```text
//! {
//!   "version": 1,
//!   "titles": [
//!     { "id": "00050000101C9500", "name": "Super Mario 3D World", "region": 2 }
//!   ]
//! }
//! ```

pub mod index;
pub mod title;

use thiserror::Error;

pub use index::{Catalog, CatalogFile, TitleEntry, TitleFilter};
pub use title::{Category, ContentFormat, Platform, Region, TitleId, TitleKind};

/// Errors produced while parsing catalog queries or data
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid {field}: {value}")]
    InvalidFilter { field: &'static str, value: String },

    #[error("Invalid title ID format: {0}")]
    InvalidTitleId(String),

    #[error("Duplicate title ID in catalog: {0}")]
    DuplicateTitle(TitleId),
}

impl CatalogError {
    pub(crate) fn invalid_filter(field: &'static str, value: &str) -> Self {
        CatalogError::InvalidFilter {
            field,
            value: value.to_string(),
        }
    }
}
