//! # Feature: Chat Configuration Store
//!
//! Process-wide map of chat id to retention policy, hydrated once from the
//! key-value store and written through on every mutation.
//!
//! Every read-modify-write runs under the map's write lock, including the
//! persistence write, so concurrent commands for one chat cannot interleave.
//! Persistence failures are logged and the in-memory change is kept.
//! Ingestion records messages under the read lock (`when_enabled`), so
//! disabling a chat waits for in-flight writes of that chat's messages.

use crate::database::KeyValueStore;
use crate::error::ConfigError;
use crate::models::{chat_key, ChatConfig, ChatId, CHAT_KEY_PREFIX};
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a status change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Changed,
    /// The chat already had the requested status; nothing was written
    Unchanged,
}

#[derive(Clone)]
pub struct ConfigStore {
    configs: Arc<RwLock<HashMap<ChatId, ChatConfig>>>,
    store: Arc<dyn KeyValueStore>,
    timeout_limit: u64,
}

impl ConfigStore {
    /// Empty store; new chats get `timeout_limit` as their ceiling
    pub fn new(store: Arc<dyn KeyValueStore>, timeout_limit: u64) -> Self {
        ConfigStore {
            configs: Arc::new(RwLock::new(HashMap::new())),
            store,
            timeout_limit,
        }
    }

    /// Build a store hydrated from every persisted `chat_` entry
    pub async fn load(store: Arc<dyn KeyValueStore>, timeout_limit: u64) -> Result<Self> {
        let config_store = Self::new(store, timeout_limit);
        let loaded = config_store.reload().await?;
        info!("Loaded {loaded} chat configuration(s)");
        Ok(config_store)
    }

    /// Replace the in-memory set with the persisted one; malformed entries are skipped
    pub async fn reload(&self) -> Result<usize> {
        let entries = self
            .store
            .list_by_prefix(CHAT_KEY_PREFIX)
            .await
            .context("Failed to list chat configurations")?;

        let mut loaded = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let config: ChatConfig = match serde_json::from_slice(&value) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Skipping malformed chat configuration {key}: {e}");
                    continue;
                }
            };

            if !config.is_consistent() {
                warn!(
                    "Skipping chat configuration {key}: timeout {} outside limit {}",
                    config.timeout, config.timeout_limit
                );
                continue;
            }

            loaded.insert(config.chat_id, config);
        }

        let count = loaded.len();
        *self.configs.write().await = loaded;
        Ok(count)
    }

    pub fn timeout_limit(&self) -> u64 {
        self.timeout_limit
    }

    pub async fn get(&self, chat_id: ChatId) -> Result<ChatConfig, ConfigError> {
        self.configs
            .read()
            .await
            .get(&chat_id)
            .cloned()
            .ok_or(ConfigError::NotFound(chat_id))
    }

    pub async fn exists(&self, chat_id: ChatId) -> bool {
        self.configs.read().await.contains_key(&chat_id)
    }

    pub async fn exists_enabled(&self, chat_id: ChatId) -> bool {
        self.configs
            .read()
            .await
            .get(&chat_id)
            .map(|config| config.enabled)
            .unwrap_or(false)
    }

    /// Run `action` only if the chat is enabled, holding the read lock until it finishes.
    /// A concurrent status change waits for the action, so nothing is recorded after a disable.
    pub async fn when_enabled<F, Fut, T>(&self, chat_id: ChatId, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let configs = self.configs.read().await;
        if !configs.get(&chat_id).is_some_and(|config| config.enabled) {
            return None;
        }
        let output = action().await;
        drop(configs);
        Some(output)
    }

    pub async fn len(&self) -> usize {
        self.configs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.configs.read().await.is_empty()
    }

    /// Owned copy of the whole set, for readers that must not hold the lock
    pub async fn snapshot(&self) -> HashMap<ChatId, ChatConfig> {
        self.configs.read().await.clone()
    }

    /// Create an enabled configuration for a chat that has none
    pub async fn create(
        &self,
        chat_id: ChatId,
        title: &str,
        default_timeout: u64,
    ) -> Result<ChatConfig, ConfigError> {
        let mut configs = self.configs.write().await;
        if configs.contains_key(&chat_id) {
            return Err(ConfigError::AlreadyExists(chat_id));
        }

        let timeout = default_timeout.clamp(1, self.timeout_limit.max(1));
        let config = ChatConfig::new(chat_id, title, timeout, self.timeout_limit);

        self.persist(&config).await;
        configs.insert(chat_id, config.clone());
        info!("Created configuration for chat {config}");
        Ok(config)
    }

    pub async fn change_timeout(&self, chat_id: ChatId, timeout: u64) -> Result<(), ConfigError> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(&chat_id)
            .ok_or(ConfigError::NotFound(chat_id))?;

        config.change_timeout(timeout)?;
        self.persist(config).await;
        info!("Timeout for chat {config} set to {timeout}s");
        Ok(())
    }

    pub async fn change_status(
        &self,
        chat_id: ChatId,
        enabled: bool,
    ) -> Result<StatusChange, ConfigError> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(&chat_id)
            .ok_or(ConfigError::NotFound(chat_id))?;

        if config.enabled == enabled {
            return Ok(StatusChange::Unchanged);
        }

        config.enabled = enabled;
        self.persist(config).await;
        info!(
            "Chat {config} {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(StatusChange::Changed)
    }

    /// Drop a chat's configuration from memory and the store; absent chats are a no-op
    pub async fn remove(&self, chat_id: ChatId) {
        let mut configs = self.configs.write().await;
        let removed = configs.remove(&chat_id);

        if let Err(e) = self.store.delete(&chat_key(chat_id)).await {
            error!("Failed to delete configuration of chat {chat_id} from store: {e}");
        }

        if let Some(config) = removed {
            info!("Removed configuration for chat {config}");
        }
    }

    async fn persist(&self, config: &ChatConfig) {
        let value = match serde_json::to_vec(config) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to encode configuration for chat {config}: {e}");
                return;
            }
        };

        if let Err(e) = self.store.put(&config.key(), &value).await {
            error!("Failed to save configuration for chat {config}: {e}");
        }
    }
}
