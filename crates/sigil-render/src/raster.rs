//! Rasterisation seam and data-URI encoding.

use base64::{Engine as _, engine::general_purpose};

use crate::error::RenderResult;

/// A rasterised sprite.
#[derive(Debug, Clone)]
pub struct RasterImage {
    /// Pixel width of the decoded sprite.
    pub width: u32,
    /// Pixel height of the decoded sprite.
    pub height: u32,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

/// Host-provided SVG-to-PNG rasteriser.
///
/// The core validates the result (dimension checks, data-URI encoding)
/// but does not own pixel work; hosts plug in whatever surface their
/// environment offers.
pub trait Rasterizer: Send + Sync {
    /// Rasterise an SVG document to a PNG image.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::RenderError`] when the document cannot be
    /// decoded or drawn.
    fn rasterize(&self, svg: &str) -> RenderResult<RasterImage>;
}

/// Encode PNG bytes as an embeddable data URI.
#[must_use]
pub fn png_data_uri(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    )
}
