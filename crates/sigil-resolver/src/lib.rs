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

//! Policy resolution: maps a page URL and color scheme to the favicon
//! that should be enforced there.
//!
//! Resolution never fails outward. Store errors, unmatched URLs,
//! missing assets, and invalid patterns all degrade to a stand-down
//! result — the worst outcome is that a favicon silently keeps its
//! original look.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use sigil_model::{
    ColorScheme, EnforcementPolicy, ImageSource, PatternType, PreferenceKey, SiteConfig,
    ThemeVariant,
};
use sigil_proto::EngineRequest;
use sigil_store::ConfigStore;

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Image to enforce; `None` tells the engine to stand down.
    pub img_url: Option<String>,
    /// Enforcement policy of the matched rule (its override, or the
    /// default); `None` when no rule matched.
    pub policy: Option<EnforcementPolicy>,
}

impl Resolution {
    const fn stand_down() -> Self {
        Self {
            img_url: None,
            policy: None,
        }
    }
}

/// Store-backed policy resolver.
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn ConfigStore>,
}

impl PolicyResolver {
    /// Construct a resolver over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Resolve an engine request.
    pub async fn resolve_request(&self, request: &EngineRequest) -> Resolution {
        let EngineRequest::ReplaceFavicon { color_scheme, url } = request;
        self.resolve(url, *color_scheme).await
    }

    /// Resolve the favicon for a page URL under a color scheme.
    ///
    /// Walks the stored rules in priority order and returns the first
    /// match, with its image source resolved against the store and
    /// theme preferences.
    pub async fn resolve(&self, url: &str, color_scheme: Option<ColorScheme>) -> Resolution {
        let configs = match self.store.active_site_configs().await {
            Ok(configs) => configs,
            Err(error) => {
                warn!(error = %error, "failed to load site configs, standing down");
                return Resolution::stand_down();
            }
        };
        let order = match self.store.site_configs_order().await {
            Ok(order) => order,
            Err(error) => {
                warn!(error = %error, "failed to load site config order, standing down");
                return Resolution::stand_down();
            }
        };

        let Some(matched) = first_match(&order.project(&configs), url) else {
            debug!(url, "no site rule matches");
            return Resolution::stand_down();
        };

        debug!(
            config_id = %matched.id,
            source = matched.source.as_ref().map_or("none", ImageSource::kind),
            url,
            "site rule matched"
        );
        let img_url = self.resolve_image(matched, color_scheme).await;
        let policy = matched
            .replace_strategy
            .clone()
            .unwrap_or_default();

        Resolution {
            img_url,
            policy: Some(policy),
        }
    }

    /// Resolve the concrete image for a matched rule.
    async fn resolve_image(
        &self,
        config: &SiteConfig,
        color_scheme: Option<ColorScheme>,
    ) -> Option<String> {
        // Candidates are filtered to rules with a source before matching.
        let source = config.source.as_ref()?;
        match source {
            ImageSource::Upload { upload_id } => match self.store.upload(*upload_id).await {
                Ok(Some(upload)) => Some(upload.data_uri),
                Ok(None) => {
                    warn!(config_id = %config.id, upload_id = %upload_id, "upload missing, standing down");
                    None
                }
                Err(error) => {
                    warn!(config_id = %config.id, error = %error, "upload lookup failed, standing down");
                    None
                }
            },
            ImageSource::UrlImport { url_import_id } => {
                match self.store.url_import(*url_import_id).await {
                    Ok(Some(import)) => Some(import.data_uri),
                    Ok(None) => {
                        warn!(config_id = %config.id, url_import_id = %url_import_id, "url import missing, standing down");
                        None
                    }
                    Err(error) => {
                        warn!(config_id = %config.id, error = %error, "url import lookup failed, standing down");
                        None
                    }
                }
            }
            ImageSource::Emoji { emoji_url } => Some(emoji_url.clone()),
            ImageSource::Icon { .. } => self.resolve_icon_variant(config, color_scheme).await,
        }
    }

    /// Pick the rendered theme variant according to the theme-toggle
    /// preferences: a dark page gets the dark variant when dark theming
    /// is enabled, otherwise the light variant when light theming is;
    /// with both toggles off, the theme-agnostic variant stands in.
    async fn resolve_icon_variant(
        &self,
        config: &SiteConfig,
        color_scheme: Option<ColorScheme>,
    ) -> Option<String> {
        let dark_enabled = self.preference_flag(PreferenceKey::DarkThemeEnabled).await;
        let light_enabled = self.preference_flag(PreferenceKey::LightThemeEnabled).await;

        let variant = |variant: ThemeVariant| config.rendered.get(variant).map(String::from);

        let mut img_url = None;
        match color_scheme {
            None => {}
            Some(ColorScheme::Dark) if dark_enabled => img_url = variant(ThemeVariant::Dark),
            Some(_) => {
                if light_enabled {
                    img_url = variant(ThemeVariant::Light);
                }
            }
        }

        if img_url.is_none() && !dark_enabled && !light_enabled {
            img_url = variant(ThemeVariant::Any);
        }
        img_url
    }

    async fn preference_flag(&self, key: PreferenceKey) -> bool {
        match self.store.preference(key).await {
            Ok(value) => value.and_then(|value| value.as_bool()).unwrap_or(false),
            Err(error) => {
                warn!(key = %key, error = %error, "preference lookup failed, treating as disabled");
                false
            }
        }
    }
}

/// First rule in priority order whose pattern matches the URL.
fn first_match<'a>(ordered: &[&'a SiteConfig], url: &str) -> Option<&'a SiteConfig> {
    ordered
        .iter()
        .filter(|config| config.is_candidate())
        .find(|config| {
            compile_matcher(config.pattern_type, &config.website_pattern)
                .is_some_and(|matcher| matcher.is_match(url))
        })
        .copied()
}

/// Compile a rule's pattern.
///
/// Simple patterns are regex-escaped and wrapped so they match as a
/// literal substring; regex patterns compile verbatim. Either way the
/// match is case-insensitive. An invalid pattern is logged and treated
/// as non-matching rather than failing the resolution.
fn compile_matcher(pattern_type: PatternType, pattern: &str) -> Option<Regex> {
    let source = match pattern_type {
        PatternType::Simple => format!(".*{}.*", regex::escape(pattern)),
        PatternType::Regex => pattern.to_owned(),
    };
    match RegexBuilder::new(&source).case_insensitive(true).build() {
        Ok(matcher) => Some(matcher),
        Err(error) => {
            warn!(pattern, error = %error, "site pattern failed to compile, treating as non-matching");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_patterns_match_literal_substrings() {
        let matcher = compile_matcher(PatternType::Simple, "example.com").expect("compiles");
        assert!(matcher.is_match("https://shop.EXAMPLE.com/cart"));
        assert!(matcher.is_match("https://example.com"));
        assert!(!matcher.is_match("https://other.test/"));
    }

    #[test]
    fn simple_patterns_neutralise_metacharacters() {
        let matcher = compile_matcher(PatternType::Simple, "a.b").expect("compiles");
        assert!(matcher.is_match("https://a.b.test/"));
        // The dot must not act as a wildcard.
        assert!(!matcher.is_match("https://aXb.test/"));

        let matcher = compile_matcher(PatternType::Simple, "shop(1)").expect("compiles");
        assert!(matcher.is_match("https://shop(1).test/"));
    }

    #[test]
    fn regex_patterns_compile_verbatim() {
        let matcher =
            compile_matcher(PatternType::Regex, r"^https://docs\.[a-z]+\.com/").expect("compiles");
        assert!(matcher.is_match("https://docs.example.com/guide"));
        assert!(!matcher.is_match("https://blog.example.com/"));
    }

    #[test]
    fn invalid_regex_is_non_matching() {
        assert!(compile_matcher(PatternType::Regex, "books(").is_none());
    }
}
