//! Error types for the enforcement engine.

use thiserror::Error;

/// Failures raised while setting up page enforcement.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The page host is excluded from enforcement.
    #[error("enforcement is disabled on '{host}'")]
    ExcludedHost {
        /// The excluded host.
        host: String,
    },
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
