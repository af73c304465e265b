#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Favicon rendering: composes an icon symbol into a styled SVG sprite
//! and rasterises it into the per-theme PNG cache on a site rule.
//!
//! This never runs on the resolution hot path — it fires when a rule's
//! icon or theme colors change. Pixel work happens behind the
//! [`Rasterizer`] seam because rasterisation is a host capability, not
//! something this crate owns; the original host used a drawing surface
//! the environment provided.

use sigil_model::{Icon, RenderedFavicons, ThemeVariant};
use tracing::warn;

pub mod error;
pub mod raster;
pub mod sprite;

pub use error::{RenderError, RenderResult};
pub use raster::{RasterImage, Rasterizer, png_data_uri};
pub use sprite::favicon_sprite;

/// Theme foreground colors taken from an icon source.
#[derive(Debug, Clone, Default)]
pub struct ThemeColors {
    /// Light-theme foreground color.
    pub light: Option<String>,
    /// Dark-theme foreground color.
    pub dark: Option<String>,
    /// Theme-agnostic foreground color.
    pub any: Option<String>,
}

impl ThemeColors {
    fn get(&self, variant: ThemeVariant) -> Option<&str> {
        match variant {
            ThemeVariant::Light => self.light.as_deref(),
            ThemeVariant::Dark => self.dark.as_deref(),
            ThemeVariant::Any => self.any.as_deref(),
        }
    }
}

/// Render one theme variant of an icon to a PNG data URI.
///
/// # Errors
///
/// Returns a [`RenderError`] when the rasteriser fails or produces a
/// zero-dimension image.
pub fn render_variant(
    icon: &Icon,
    color: Option<&str>,
    rasterizer: &dyn Rasterizer,
) -> RenderResult<String> {
    let svg = favicon_sprite(icon, color);
    let image = rasterizer.rasterize(&svg)?;
    if image.width == 0 || image.height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }
    Ok(png_data_uri(&image.png))
}

/// Render all three theme variants, tolerating per-variant failures.
///
/// A variant that fails to render is logged and left unset; the other
/// variants are unaffected.
#[must_use]
pub fn render_favicons(
    icon: &Icon,
    colors: &ThemeColors,
    rasterizer: &dyn Rasterizer,
) -> RenderedFavicons {
    let mut rendered = RenderedFavicons::default();
    for variant in [ThemeVariant::Light, ThemeVariant::Dark, ThemeVariant::Any] {
        match render_variant(icon, colors.get(variant), rasterizer) {
            Ok(data_uri) => rendered.set(variant, Some(data_uri)),
            Err(error) => {
                warn!(
                    icon_id = %icon.id,
                    variant = variant.as_str(),
                    error = %error,
                    "favicon variant failed to render, leaving it unset"
                );
            }
        }
    }
    rendered
}
