use crate::database::KeyValueStore;
use crate::models::{
    chat_messages_prefix, message_key, ChatConfig, ChatId, MessageId, MessageRecord,
    MESSAGE_KEY_PREFIX,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Persisted set of tracked messages, keyed `msg_<chat>_<msg>`.
///
/// The registry applies no policy of its own: callers decide whether a
/// message qualifies before recording it.
#[derive(Clone)]
pub struct MessageRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl MessageRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        MessageRegistry { store }
    }

    pub async fn record_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        created_at: i64,
    ) -> Result<()> {
        let record = MessageRecord::new(chat_id, message_id, created_at);
        let value = serde_json::to_vec(&record)?;
        self.store
            .put(&record.key(), &value)
            .await
            .with_context(|| format!("Failed to save message {record}"))?;
        debug!("Recorded message {record}");
        Ok(())
    }

    /// Every record stored for one chat
    pub async fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>> {
        let entries = self
            .store
            .list_by_prefix(&chat_messages_prefix(chat_id))
            .await
            .with_context(|| format!("Failed to list messages of chat {chat_id}"))?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(record) = decode(&key, &value) else {
                continue;
            };
            if record.chat_id != chat_id {
                warn!(
                    "Skipping message {key}: stored chat id {} does not match",
                    record.chat_id
                );
                continue;
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Every record whose chat is present in `configs`, paired with that chat's config.
    /// Records without a config are orphans and are dropped.
    pub async fn list_all(
        &self,
        configs: &HashMap<ChatId, ChatConfig>,
    ) -> Result<Vec<(MessageRecord, ChatConfig)>> {
        let entries = self
            .store
            .list_by_prefix(MESSAGE_KEY_PREFIX)
            .await
            .context("Failed to list messages")?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(record) = decode(&key, &value) else {
                continue;
            };
            match configs.get(&record.chat_id) {
                Some(config) => records.push((record, config.clone())),
                None => warn!("Dropping orphaned message {record}: chat has no configuration"),
            }
        }

        Ok(records)
    }

    /// Remove one record; a missing record is not an error
    pub async fn delete_record(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.store
            .delete(&message_key(chat_id, message_id))
            .await
            .with_context(|| format!("Failed to delete message {chat_id}/{message_id}"))
    }
}

fn decode(key: &str, value: &[u8]) -> Option<MessageRecord> {
    match serde_json::from_slice(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping malformed message record {key}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn setup() -> (Arc<Database>, MessageRegistry) {
        let db = Arc::new(Database::new(":memory:").await.unwrap());
        let registry = MessageRegistry::new(db.clone());
        (db, registry)
    }

    #[tokio::test]
    async fn test_record_and_list_by_chat() {
        let (_db, registry) = setup().await;

        registry.record_message(12, 1, 100).await.unwrap();
        registry.record_message(12, 2, 200).await.unwrap();
        registry.record_message(123, 1, 300).await.unwrap();

        let records = registry.list_by_chat(12).await.unwrap();
        assert_eq!(
            records,
            vec![MessageRecord::new(12, 1, 100), MessageRecord::new(12, 2, 200)]
        );
        assert_eq!(registry.list_by_chat(123).await.unwrap().len(), 1);
        assert!(registry.list_by_chat(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_chat_skips_mismatched_records() {
        let (db, registry) = setup().await;

        registry.record_message(7, 1, 100).await.unwrap();
        let foreign = MessageRecord::new(8, 2, 100);
        db.put("msg_7_2", &serde_json::to_vec(&foreign).unwrap())
            .await
            .unwrap();
        db.put("msg_7_3", b"garbage").await.unwrap();

        let records = registry.list_by_chat(7).await.unwrap();
        assert_eq!(records, vec![MessageRecord::new(7, 1, 100)]);
    }

    #[tokio::test]
    async fn test_list_all_drops_orphans() {
        let (_db, registry) = setup().await;

        registry.record_message(1, 10, 100).await.unwrap();
        registry.record_message(1, 11, 110).await.unwrap();
        registry.record_message(2, 20, 200).await.unwrap();

        let mut configs = HashMap::new();
        configs.insert(1, ChatConfig::new(1, "one", 60, 600));

        let pairs = registry.list_all(&configs).await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(record, config)| record.chat_id == 1 && config.chat_id == 1));

        assert!(registry.list_all(&HashMap::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_record_is_idempotent() {
        let (db, registry) = setup().await;

        registry.record_message(5, 50, 100).await.unwrap();
        registry.delete_record(5, 50).await.unwrap();
        registry.delete_record(5, 50).await.unwrap();

        assert_eq!(db.list_by_prefix("msg_").await.unwrap().len(), 0);
    }
}
