//! In-memory reference implementation of the storage boundary.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use sigil_model::{Icon, PreferenceKey, SiteConfig, SiteConfigsOrder, Upload, UrlImport};
use tracing::debug;
use uuid::Uuid;

use crate::ConfigStore;
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct State {
    configs: HashMap<Uuid, SiteConfig>,
    order: Vec<Uuid>,
    preferences: HashMap<&'static str, Value>,
    uploads: HashMap<Uuid, Upload>,
    url_imports: HashMap<Uuid, UrlImport>,
    icons: HashMap<Uuid, Icon>,
}

/// Thread-safe in-memory store.
///
/// Besides the read boundary it implements the lifecycle rules the data
/// layer is responsible for: new rules are appended to the priority
/// order, deleting an asset nulls the source of every rule that
/// referenced it, and deleted rules are pruned from the order lazily on
/// the next read.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().expect("store lock poisoned")
    }

    /// Insert or replace a site rule.
    ///
    /// A rule not yet present is appended to the end of the priority
    /// order (lowest priority).
    pub fn upsert_site_config(&self, config: SiteConfig) {
        let mut state = self.write();
        if !state.configs.contains_key(&config.id) {
            state.order.push(config.id);
        }
        debug!(config_id = %config.id, "storing site config");
        state.configs.insert(config.id, config);
    }

    /// Delete a site rule.
    ///
    /// The priority order keeps the dangling entry until the next
    /// [`ConfigStore::site_configs_order`] read prunes it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SiteConfigNotFound`] when no such rule
    /// exists.
    pub fn delete_site_config(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.write();
        state
            .configs
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::SiteConfigNotFound { id })
    }

    /// Store an upload.
    pub fn put_upload(&self, upload: Upload) {
        self.write().uploads.insert(upload.id, upload);
    }

    /// Store a url import.
    pub fn put_url_import(&self, import: UrlImport) {
        self.write().url_imports.insert(import.id, import);
    }

    /// Store an icon symbol.
    pub fn put_icon(&self, icon: Icon) {
        self.write().icons.insert(icon.id, icon);
    }

    /// Delete an upload, nulling the source of any rule that used it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UploadNotFound`] when no such upload exists.
    pub fn delete_upload(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.write();
        state
            .uploads
            .remove(&id)
            .ok_or(StoreError::UploadNotFound { id })?;
        for config in state.configs.values_mut() {
            if config
                .source
                .as_ref()
                .is_some_and(|source| source.references_upload(id))
            {
                debug!(config_id = %config.id, upload_id = %id, "nulling source of orphaned rule");
                config.set_source(None);
            }
        }
        Ok(())
    }

    /// Delete a url import, nulling the source of any rule that used it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UrlImportNotFound`] when no such import
    /// exists.
    pub fn delete_url_import(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.write();
        state
            .url_imports
            .remove(&id)
            .ok_or(StoreError::UrlImportNotFound { id })?;
        for config in state.configs.values_mut() {
            if config
                .source
                .as_ref()
                .is_some_and(|source| source.references_url_import(id))
            {
                debug!(config_id = %config.id, url_import_id = %id, "nulling source of orphaned rule");
                config.set_source(None);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn site_configs(&self) -> StoreResult<Vec<SiteConfig>> {
        Ok(self.read().configs.values().cloned().collect())
    }

    async fn site_config(&self, id: Uuid) -> StoreResult<Option<SiteConfig>> {
        Ok(self.read().configs.get(&id).cloned())
    }

    async fn site_configs_order(&self) -> StoreResult<SiteConfigsOrder> {
        let mut state = self.write();
        let existing: HashSet<Uuid> = state.configs.keys().copied().collect();
        let mut order = SiteConfigsOrder::new(state.order.clone());
        if order.prune(&existing) {
            debug!("pruned dangling entries from site config order");
            state.order.clone_from(&order.ids);
        }
        Ok(order)
    }

    async fn set_site_configs_order(&self, order: SiteConfigsOrder) -> StoreResult<()> {
        let mut state = self.write();
        let mut seen = HashSet::new();
        for id in &order.ids {
            if !state.configs.contains_key(id) {
                return Err(StoreError::UnknownOrderEntry { id: *id });
            }
            if !seen.insert(*id) {
                return Err(StoreError::DuplicateOrderEntry { id: *id });
            }
        }
        state.order = order.ids;
        Ok(())
    }

    async fn preference(&self, key: PreferenceKey) -> StoreResult<Option<Value>> {
        if key == PreferenceKey::SiteConfigsOrder {
            let order = self.site_configs_order().await?;
            return Ok(Some(
                serde_json::to_value(order).expect("order always serialises"),
            ));
        }
        Ok(self.read().preferences.get(key.as_str()).cloned())
    }

    async fn update_preference(&self, key: PreferenceKey, value: Value) -> StoreResult<()> {
        if key == PreferenceKey::SiteConfigsOrder {
            let order: SiteConfigsOrder =
                serde_json::from_value(value).map_err(|source| StoreError::PreferenceDecode {
                    key: key.as_str(),
                    source,
                })?;
            return self.set_site_configs_order(order).await;
        }
        self.write().preferences.insert(key.as_str(), value);
        Ok(())
    }

    async fn upload(&self, id: Uuid) -> StoreResult<Option<Upload>> {
        Ok(self.read().uploads.get(&id).cloned())
    }

    async fn url_import(&self, id: Uuid) -> StoreResult<Option<UrlImport>> {
        Ok(self.read().url_imports.get(&id).cloned())
    }

    async fn icon(&self, id: Uuid) -> StoreResult<Option<Icon>> {
        Ok(self.read().icons.get(&id).cloned())
    }
}
