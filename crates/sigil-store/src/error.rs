//! Error types for the storage boundary.

use thiserror::Error;
use uuid::Uuid;

/// Failures raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A site rule lookup failed.
    #[error("site config {id} not found")]
    SiteConfigNotFound {
        /// Missing rule identifier.
        id: Uuid,
    },
    /// An upload lookup failed.
    #[error("upload {id} not found")]
    UploadNotFound {
        /// Missing upload identifier.
        id: Uuid,
    },
    /// A url-import lookup failed.
    #[error("url import {id} not found")]
    UrlImportNotFound {
        /// Missing import identifier.
        id: Uuid,
    },
    /// A submitted order referenced a rule that does not exist.
    #[error("order entry {id} does not reference an existing site config")]
    UnknownOrderEntry {
        /// Offending identifier.
        id: Uuid,
    },
    /// A submitted order listed the same rule twice.
    #[error("order entry {id} appears more than once")]
    DuplicateOrderEntry {
        /// Offending identifier.
        id: Uuid,
    },
    /// A stored preference value could not be decoded.
    #[error("preference '{key}' holds an unexpected value")]
    PreferenceDecode {
        /// Preference key that failed to decode.
        key: &'static str,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// The backing store failed for implementation-specific reasons.
    #[error("store backend failure")]
    Backend {
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
