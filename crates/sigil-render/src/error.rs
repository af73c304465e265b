//! Error types for the rendering pipeline.

use thiserror::Error;

/// Failures raised while rendering a favicon variant.
///
/// All of them are recoverable: the affected variant is left unset and
/// the remaining variants render independently.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rasterised image had no drawable area.
    #[error("invalid image dimensions {width}x{height}, both must be greater than 0")]
    InvalidDimensions {
        /// Reported pixel width.
        width: u32,
        /// Reported pixel height.
        height: u32,
    },
    /// The host rasteriser failed to decode or draw the sprite.
    #[error("failed to rasterise sprite")]
    Rasterize {
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience alias for rendering results.
pub type RenderResult<T> = Result<T, RenderError>;
