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

//! Core data model shared across the Sigil workspace: site rules, image
//! sources, the rendered-favicon cache, and the enforcement policy schema.

pub mod assets;
pub mod config;
pub mod policy;

pub use assets::{Icon, Upload, UrlImport};
pub use config::{
    ImageSource, PatternType, RenderedFavicons, SiteConfig, SiteConfigsOrder, ThemeVariant,
};
pub use policy::{ColorScheme, EnforcementPolicy, MutationWatch, PersistencePolicy, UrlWatch};

/// Preference keys recognised by the core.
///
/// Values are opaque JSON owned by the store; these keys are the only ones
/// the resolver and engine ever read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    /// Ordered list of site-config ids defining match priority.
    SiteConfigsOrder,
    /// Whether dark-theme icon variants are served.
    DarkThemeEnabled,
    /// Whether light-theme icon variants are served.
    LightThemeEnabled,
}

impl PreferenceKey {
    /// Stable storage key for this preference.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SiteConfigsOrder => "siteConfigsOrder",
            Self::DarkThemeEnabled => "darkThemeEnabled",
            Self::LightThemeEnabled => "lightThemeEnabled",
        }
    }
}

impl std::fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
