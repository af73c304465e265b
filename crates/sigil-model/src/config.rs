//! Site rules: URL patterns bound to replacement favicon sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::policy::EnforcementPolicy;

/// How a site rule's `website_pattern` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternType {
    /// Literal substring match; regex metacharacters are neutralised.
    Simple,
    /// The pattern is used as a regular expression verbatim.
    Regex,
}

/// Replacement image source for a site rule.
///
/// Exactly one source is populated by construction; replacing the source
/// replaces the whole variant, so the old one can never linger alongside
/// the new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImageSource {
    /// A user-uploaded image, stored by the data layer.
    #[serde(rename_all = "camelCase")]
    Upload {
        /// Identifier of the stored upload.
        upload_id: Uuid,
    },
    /// An image imported from a URL, stored by the data layer.
    #[serde(rename_all = "camelCase")]
    UrlImport {
        /// Identifier of the stored import.
        url_import_id: Uuid,
    },
    /// A ready-to-use emoji image URL.
    #[serde(rename_all = "camelCase")]
    Emoji {
        /// Direct image URL for the emoji.
        emoji_url: String,
    },
    /// An icon-pack symbol rendered per theme.
    #[serde(rename_all = "camelCase")]
    Icon {
        /// Identifier of the icon symbol.
        icon_id: Uuid,
        /// Foreground color for the light-theme variant.
        #[serde(skip_serializing_if = "Option::is_none")]
        light_color: Option<String>,
        /// Foreground color for the dark-theme variant.
        #[serde(skip_serializing_if = "Option::is_none")]
        dark_color: Option<String>,
        /// Foreground color for the theme-agnostic variant.
        #[serde(skip_serializing_if = "Option::is_none")]
        any_color: Option<String>,
    },
}

impl ImageSource {
    /// Convenience constructor for upload-backed sources.
    #[must_use]
    pub const fn upload(upload_id: Uuid) -> Self {
        Self::Upload { upload_id }
    }

    /// Convenience constructor for url-import-backed sources.
    #[must_use]
    pub const fn url_import(url_import_id: Uuid) -> Self {
        Self::UrlImport { url_import_id }
    }

    /// Convenience constructor for emoji sources.
    #[must_use]
    pub fn emoji(emoji_url: impl Into<String>) -> Self {
        Self::Emoji {
            emoji_url: emoji_url.into(),
        }
    }

    /// Convenience constructor for icon sources with no theme colors set.
    #[must_use]
    pub const fn icon(icon_id: Uuid) -> Self {
        Self::Icon {
            icon_id,
            light_color: None,
            dark_color: None,
            any_color: None,
        }
    }

    /// Machine-friendly discriminator for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::UrlImport { .. } => "url_import",
            Self::Emoji { .. } => "emoji",
            Self::Icon { .. } => "icon",
        }
    }

    /// Whether this source references the given stored upload.
    #[must_use]
    pub fn references_upload(&self, id: Uuid) -> bool {
        matches!(self, Self::Upload { upload_id } if *upload_id == id)
    }

    /// Whether this source references the given stored url import.
    #[must_use]
    pub fn references_url_import(&self, id: Uuid) -> bool {
        matches!(self, Self::UrlImport { url_import_id } if *url_import_id == id)
    }
}

/// Theme variant selector for rendered icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThemeVariant {
    /// Rendered with the light-theme foreground color.
    Light,
    /// Rendered with the dark-theme foreground color.
    Dark,
    /// Rendered with the theme-agnostic foreground color.
    Any,
}

impl ThemeVariant {
    /// Stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Any => "any",
        }
    }
}

/// Cache of rendered PNG data URIs derived from an icon source.
///
/// Derived state: cleared whenever the source changes and repopulated by
/// the rendering sub-operation. A variant that failed to render stays
/// unset without affecting the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderedFavicons {
    /// Light-theme PNG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_png_url: Option<String>,
    /// Dark-theme PNG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_png_url: Option<String>,
    /// Theme-agnostic PNG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_png_url: Option<String>,
}

impl RenderedFavicons {
    /// Access the cached data URI for a theme variant.
    #[must_use]
    pub fn get(&self, variant: ThemeVariant) -> Option<&str> {
        match variant {
            ThemeVariant::Light => self.light_png_url.as_deref(),
            ThemeVariant::Dark => self.dark_png_url.as_deref(),
            ThemeVariant::Any => self.any_png_url.as_deref(),
        }
    }

    /// Replace the cached data URI for a theme variant.
    pub fn set(&mut self, variant: ThemeVariant, data_uri: Option<String>) {
        match variant {
            ThemeVariant::Light => self.light_png_url = data_uri,
            ThemeVariant::Dark => self.dark_png_url = data_uri,
            ThemeVariant::Any => self.any_png_url = data_uri,
        }
    }

    /// Whether no variant has been rendered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.light_png_url.is_none() && self.dark_png_url.is_none() && self.any_png_url.is_none()
    }

    /// Drop all cached variants.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A user rule binding a URL pattern to a replacement favicon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Unique, stable identifier.
    pub id: Uuid,
    /// Pattern matched against page URLs.
    pub website_pattern: String,
    /// Interpretation of `website_pattern`.
    pub pattern_type: PatternType,
    /// Replacement image source; `None` when a referenced asset was
    /// deleted out from under the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ImageSource>,
    /// Rendered per-theme PNG cache (icon sources only).
    #[serde(default)]
    pub rendered: RenderedFavicons,
    /// Whether the rule participates in matching.
    pub active: bool,
    /// Optional override of the default enforcement policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_strategy: Option<EnforcementPolicy>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    /// Create an active rule with a fresh identifier.
    #[must_use]
    pub fn new(
        website_pattern: impl Into<String>,
        pattern_type: PatternType,
        source: ImageSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            website_pattern: website_pattern.into(),
            pattern_type,
            source: Some(source),
            rendered: RenderedFavicons::default(),
            active: true,
            replace_strategy: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the image source, dropping the stale rendered cache.
    pub fn set_source(&mut self, source: Option<ImageSource>) {
        self.source = source;
        self.rendered.clear();
        self.updated_at = Utc::now();
    }

    /// Whether the rule can participate in resolution: it needs a
    /// non-empty pattern and a populated source.
    #[must_use]
    pub fn is_candidate(&self) -> bool {
        !self.website_pattern.is_empty() && self.source.is_some()
    }
}

/// Ordered sequence of site-config ids defining match priority.
///
/// First match wins. The sequence is a permutation-subset of existing
/// config ids; entries for deleted configs are pruned lazily at read or
/// projection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteConfigsOrder {
    /// Config ids in priority order.
    pub ids: Vec<Uuid>,
}

impl SiteConfigsOrder {
    /// Build an order from ids.
    #[must_use]
    pub const fn new(ids: Vec<Uuid>) -> Self {
        Self { ids }
    }

    /// Drop entries that no longer reference an existing config.
    ///
    /// Returns `true` when anything was removed.
    pub fn prune(&mut self, existing: &HashSet<Uuid>) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| existing.contains(id));
        self.ids.len() != before
    }

    /// Project configs into priority order.
    ///
    /// Configs whose id is absent from the order are dropped, mirroring
    /// the resolver's candidate-selection rule.
    #[must_use]
    pub fn project<'a>(&self, configs: &'a [SiteConfig]) -> Vec<&'a SiteConfig> {
        self.ids
            .iter()
            .filter_map(|id| configs.iter().find(|config| config.id == *id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(pattern: &str) -> SiteConfig {
        SiteConfig::new(pattern, PatternType::Simple, ImageSource::emoji("e.png"))
    }

    #[test]
    fn set_source_clears_rendered_cache() {
        let mut config = sample_config("example.com");
        config.rendered.set(ThemeVariant::Dark, Some("data:dark".into()));
        assert!(!config.rendered.is_empty());

        config.set_source(Some(ImageSource::upload(Uuid::new_v4())));
        assert!(config.rendered.is_empty());
    }

    #[test]
    fn candidate_requires_pattern_and_source() {
        let mut config = sample_config("example.com");
        assert!(config.is_candidate());

        config.set_source(None);
        assert!(!config.is_candidate());

        let empty_pattern = sample_config("");
        assert!(!empty_pattern.is_candidate());
    }

    #[test]
    fn order_projection_drops_unlisted_configs() {
        let a = sample_config("a");
        let b = sample_config("b");
        let c = sample_config("c");
        let configs = vec![a.clone(), b.clone(), c.clone()];

        let order = SiteConfigsOrder::new(vec![c.id, a.id]);
        let projected = order.project(&configs);
        let ids: Vec<Uuid> = projected.iter().map(|config| config.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);
    }

    #[test]
    fn prune_drops_dangling_ids() {
        let a = sample_config("a");
        let stale = Uuid::new_v4();
        let mut order = SiteConfigsOrder::new(vec![stale, a.id]);

        let existing: HashSet<Uuid> = [a.id].into_iter().collect();
        assert!(order.prune(&existing));
        assert_eq!(order.ids, vec![a.id]);
        assert!(!order.prune(&existing));
    }

    #[test]
    fn image_source_round_trips_tagged() {
        let source = ImageSource::Icon {
            icon_id: Uuid::new_v4(),
            light_color: Some("#222222".into()),
            dark_color: Some("#eeeeee".into()),
            any_color: None,
        };
        let json = serde_json::to_value(&source).expect("serialise source");
        assert_eq!(json.get("type"), Some(&serde_json::json!("icon")));
        assert!(json.get("lightColor").is_some());

        let back: ImageSource = serde_json::from_value(json).expect("deserialise source");
        assert_eq!(back, source);
    }

    #[test]
    fn source_references_detect_cascade_targets() {
        let id = Uuid::new_v4();
        assert!(ImageSource::upload(id).references_upload(id));
        assert!(!ImageSource::upload(id).references_url_import(id));
        assert!(ImageSource::url_import(id).references_url_import(id));
    }
}
