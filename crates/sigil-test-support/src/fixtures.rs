//! Seeded stores, rule builders, and a deterministic rasterizer.

use uuid::Uuid;

use sigil_model::{
    EnforcementPolicy, Icon, ImageSource, PatternType, PersistencePolicy, PreferenceKey,
    SiteConfig, Upload, UrlImport, UrlWatch,
};
use sigil_render::{RasterImage, Rasterizer, RenderResult, ThemeColors, render_favicons};
use sigil_store::MemoryStore;

/// A rule backed by a stored upload; returns the rule and the upload's
/// data URI.
#[must_use]
pub fn upload_rule(store: &MemoryStore, pattern: &str) -> (SiteConfig, String) {
    let data_uri = format!("data:image/png;base64,{}", Uuid::new_v4().simple());
    let upload = Upload {
        id: Uuid::new_v4(),
        data_uri: data_uri.clone(),
    };
    store.put_upload(upload.clone());
    let config = SiteConfig::new(pattern, PatternType::Simple, ImageSource::upload(upload.id));
    store.upsert_site_config(config.clone());
    (config, data_uri)
}

/// A rule backed by a stored url import; returns the rule and the
/// import's data URI.
#[must_use]
pub fn url_import_rule(store: &MemoryStore, pattern: &str) -> (SiteConfig, String) {
    let data_uri = format!("data:image/png;base64,{}", Uuid::new_v4().simple());
    let import = UrlImport {
        id: Uuid::new_v4(),
        data_uri: data_uri.clone(),
    };
    store.put_url_import(import.clone());
    let config = SiteConfig::new(
        pattern,
        PatternType::Simple,
        ImageSource::url_import(import.id),
    );
    store.upsert_site_config(config.clone());
    (config, data_uri)
}

/// A rule serving an emoji URL directly.
#[must_use]
pub fn emoji_rule(store: &MemoryStore, pattern: &str, emoji_url: &str) -> SiteConfig {
    let config = SiteConfig::new(pattern, PatternType::Simple, ImageSource::emoji(emoji_url));
    store.upsert_site_config(config.clone());
    config
}

/// An icon-backed rule with pre-rendered theme variants.
#[must_use]
pub fn icon_rule(
    store: &MemoryStore,
    pattern: &str,
    light: Option<&str>,
    dark: Option<&str>,
    any: Option<&str>,
) -> SiteConfig {
    let mut config = SiteConfig::new(
        pattern,
        PatternType::Simple,
        ImageSource::icon(Uuid::new_v4()),
    );
    config.rendered.light_png_url = light.map(Into::into);
    config.rendered.dark_png_url = dark.map(Into::into);
    config.rendered.any_png_url = any.map(Into::into);
    store.upsert_site_config(config.clone());
    config
}

/// An icon-backed rule whose variants run through the real rendering
/// pipeline (sprite composition plus the fixed rasterizer).
#[must_use]
pub fn rendered_icon_rule(store: &MemoryStore, pattern: &str) -> SiteConfig {
    let icon = Icon {
        id: Uuid::new_v4(),
        symbol: "<symbol id=\"glyph\"><circle cx=\"256\" cy=\"256\" r=\"200\"/></symbol>".into(),
        icon_pack_name: "Ionicons".into(),
    };
    store.put_icon(icon.clone());

    let colors = ThemeColors {
        light: Some("#1a1a1a".into()),
        dark: Some("#f5f5f5".into()),
        any: Some("#808080".into()),
    };
    let mut config = SiteConfig::new(
        pattern,
        PatternType::Simple,
        ImageSource::Icon {
            icon_id: icon.id,
            light_color: colors.light.clone(),
            dark_color: colors.dark.clone(),
            any_color: colors.any.clone(),
        },
    );
    config.rendered = render_favicons(
        &icon,
        &colors,
        &FixedRasterizer {
            width: 1_000,
            height: 1_000,
        },
    );
    store.upsert_site_config(config.clone());
    config
}

/// Set the theme-toggle preferences.
pub async fn set_theme_toggles(store: &MemoryStore, dark: bool, light: bool) {
    use sigil_store::ConfigStore as _;
    store
        .update_preference(PreferenceKey::DarkThemeEnabled, serde_json::json!(dark))
        .await
        .expect("set dark toggle");
    store
        .update_preference(PreferenceKey::LightThemeEnabled, serde_json::json!(light))
        .await
        .expect("set light toggle");
}

/// An enforcement policy tuned for fast, deterministic tests: tight
/// un-jittered persistence, no URL polling, single managed tag.
#[must_use]
pub fn fast_policy() -> EnforcementPolicy {
    EnforcementPolicy {
        add_shortcut_link: false,
        add_css_hiding: false,
        persistence: PersistencePolicy {
            check_interval_time: 50,
            randomization_factor: 0.0,
            ..PersistencePolicy::default()
        },
        url_change_detection: UrlWatch {
            check_interval_time: 0,
            ..UrlWatch::default()
        },
        ..EnforcementPolicy::default()
    }
}

/// Rasterizer producing a fixed-size placeholder image.
pub struct FixedRasterizer {
    /// Reported pixel width.
    pub width: u32,
    /// Reported pixel height.
    pub height: u32,
}

impl Rasterizer for FixedRasterizer {
    fn rasterize(&self, _svg: &str) -> RenderResult<RasterImage> {
        Ok(RasterImage {
            width: self.width,
            height: self.height,
            png: vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a],
        })
    }
}
