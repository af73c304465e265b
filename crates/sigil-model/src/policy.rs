//! Enforcement policy schema and defaults.
//!
//! The policy travels on the wire inside `setFavicon` responses
//! (`replaceStrategy`), so field names serialise in the historical
//! camelCase shape and every field carries a default: a partial strategy
//! stored against a single site rule still deserialises into a complete
//! policy.

use serde::{Deserialize, Serialize};

/// Effective color scheme reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// The page prefers light UI.
    Light,
    /// The page prefers dark UI.
    Dark,
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

/// Configuration record controlling how a replacement favicon is applied
/// and defended on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnforcementPolicy {
    /// Strip pre-existing favicon-related `<link>`/`<meta>` tags.
    pub remove_existing_icons: bool,
    /// Inject a style rule hiding any non-managed favicon link.
    pub add_css_hiding: bool,
    /// Also emit a legacy `rel="shortcut icon"` link.
    ///
    /// Doubles the expected managed-tag count.
    pub add_shortcut_link: bool,
    /// Whether/how to watch the DOM for tampering.
    pub observe_mutations: MutationWatch,
    /// Periodic self-check/retry policy.
    pub persistence: PersistencePolicy,
    /// SPA navigation polling/eventing.
    pub url_change_detection: UrlWatch,
}

impl Default for EnforcementPolicy {
    fn default() -> Self {
        Self {
            remove_existing_icons: true,
            add_css_hiding: true,
            add_shortcut_link: true,
            observe_mutations: MutationWatch::default(),
            persistence: PersistencePolicy::default(),
            url_change_detection: UrlWatch::default(),
        }
    }
}

impl EnforcementPolicy {
    /// Number of managed favicon tags an applied policy is expected to keep
    /// in the page head.
    #[must_use]
    pub const fn expected_tag_count(&self) -> usize {
        if self.add_shortcut_link { 2 } else { 1 }
    }
}

/// Mutation-observation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MutationWatch {
    /// Whether the DOM is observed at all.
    pub enabled: bool,
    /// Attribute names whose changes are reported.
    pub attribute_filter: Vec<String>,
    /// Optional selector narrowing the observed subtree; `None` observes
    /// the document root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_selector: Option<String>,
}

impl Default for MutationWatch {
    fn default() -> Self {
        Self {
            enabled: true,
            attribute_filter: vec!["href".into(), "rel".into(), "src".into()],
            target_selector: None,
        }
    }
}

/// Periodic persistence-check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistencePolicy {
    /// Whether periodic checking runs at all.
    pub enabled: bool,
    /// Base interval between checks in milliseconds; `0` disables checking.
    pub check_interval_time: u64,
    /// Fraction by which each interval is jittered (e.g. `0.2` for ±20%).
    pub randomization_factor: f64,
    /// Number of retry attempts after a violation; `None` means a single
    /// violation gives up immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_limit: Option<u32>,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_time: 400,
            randomization_factor: 0.2,
            retry_limit: None,
        }
    }
}

/// SPA URL-change detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlWatch {
    /// Whether URL changes are acted on at all.
    pub enabled: bool,
    /// Polling interval in milliseconds; `0` relies on navigation events
    /// alone.
    pub check_interval_time: u64,
}

impl Default for UrlWatch {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_time: 1_000,
        }
    }
}
