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

//! Storage boundary consumed by the resolver.
//!
//! The core never talks to a concrete database: it reads site rules,
//! preferences, and assets through [`ConfigStore`], and the settings
//! surface that owns persistence implements it. [`MemoryStore`] is the
//! in-repo reference implementation used by the runtime wiring and every
//! test suite; it also carries the lifecycle rules (asset-deletion
//! cascades, order validation) so they are exercised somewhere real.

use async_trait::async_trait;
use serde_json::Value;
use sigil_model::{Icon, PreferenceKey, SiteConfig, SiteConfigsOrder, Upload, UrlImport};
use uuid::Uuid;

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// Narrow interface the core consumes from the data layer.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All stored site rules.
    async fn site_configs(&self) -> StoreResult<Vec<SiteConfig>>;

    /// Stored site rules with `active` set.
    async fn active_site_configs(&self) -> StoreResult<Vec<SiteConfig>> {
        Ok(self
            .site_configs()
            .await?
            .into_iter()
            .filter(|config| config.active)
            .collect())
    }

    /// Look up a single site rule.
    async fn site_config(&self, id: Uuid) -> StoreResult<Option<SiteConfig>>;

    /// The priority order, pruned of entries whose rule no longer exists.
    async fn site_configs_order(&self) -> StoreResult<SiteConfigsOrder>;

    /// Replace the priority order.
    ///
    /// The new order must be a permutation-subset of existing rule ids:
    /// unknown or duplicated entries are rejected.
    async fn set_site_configs_order(&self, order: SiteConfigsOrder) -> StoreResult<()>;

    /// Read a preference value.
    async fn preference(&self, key: PreferenceKey) -> StoreResult<Option<Value>>;

    /// Write a preference value.
    async fn update_preference(&self, key: PreferenceKey, value: Value) -> StoreResult<()>;

    /// Look up a stored upload.
    async fn upload(&self, id: Uuid) -> StoreResult<Option<Upload>>;

    /// Look up a stored url import.
    async fn url_import(&self, id: Uuid) -> StoreResult<Option<UrlImport>>;

    /// Look up an icon symbol.
    async fn icon(&self, id: Uuid) -> StoreResult<Option<Icon>>;
}
