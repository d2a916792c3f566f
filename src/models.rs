//! Persisted entities: per-chat retention policy and tracked message metadata.

use crate::duration::format_duration;
use crate::error::TimeoutError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat identifier on the messaging platform
pub type ChatId = i64;

/// Message identifier, unique within a chat
pub type MessageId = i64;

/// Key prefix shared by every persisted chat configuration
pub const CHAT_KEY_PREFIX: &str = "chat_";

/// Key prefix shared by every persisted message record
pub const MESSAGE_KEY_PREFIX: &str = "msg_";

/// Retention policy for a single chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub chat_id: ChatId,
    /// Current retention window in seconds
    pub timeout: u64,
    /// Ceiling for `timeout`, fixed when the config is created
    pub timeout_limit: u64,
    pub enabled: bool,
    #[serde(default)]
    pub title: String,
}

impl ChatConfig {
    pub fn new(chat_id: ChatId, title: &str, timeout: u64, timeout_limit: u64) -> Self {
        ChatConfig {
            chat_id,
            timeout,
            timeout_limit,
            enabled: true,
            title: title.to_string(),
        }
    }

    pub fn key(&self) -> String {
        chat_key(self.chat_id)
    }

    /// Check a candidate timeout against this chat's bounds
    pub fn validate_timeout(&self, timeout: u64) -> Result<(), TimeoutError> {
        if timeout == 0 {
            return Err(TimeoutError::TooLow);
        }
        if timeout > self.timeout_limit {
            return Err(TimeoutError::ExceedsLimit {
                limit: self.timeout_limit,
            });
        }
        Ok(())
    }

    pub fn change_timeout(&mut self, timeout: u64) -> Result<(), TimeoutError> {
        self.validate_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    /// Whether the stored values satisfy `0 < timeout <= timeout_limit`
    pub fn is_consistent(&self) -> bool {
        self.validate_timeout(self.timeout).is_ok()
    }

    /// Human readable status line used by the `setting` command
    pub fn describe(&self) -> String {
        let status = if self.enabled { "enabled" } else { "disabled" };
        format!(
            "Status: {}, Timeout: {}, Maximum timeout: {}",
            status,
            format_duration(self.timeout),
            format_duration(self.timeout_limit)
        )
    }
}

impl fmt::Display for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}", self.chat_id)
        } else {
            write!(f, "{} ({})", self.title, self.chat_id)
        }
    }
}

/// Metadata for one message that will be deleted once it outlives its chat's timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Unix seconds
    pub created_at: i64,
}

impl MessageRecord {
    pub fn new(chat_id: ChatId, message_id: MessageId, created_at: i64) -> Self {
        MessageRecord {
            chat_id,
            message_id,
            created_at,
        }
    }

    pub fn key(&self) -> String {
        message_key(self.chat_id, self.message_id)
    }

    /// A record is outdated once its age reaches the owning chat's timeout
    pub fn is_outdated(&self, config: &ChatConfig, now: i64) -> bool {
        match i64::try_from(config.timeout) {
            Ok(timeout) => now.saturating_sub(self.created_at) >= timeout,
            Err(_) => false,
        }
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

pub fn chat_key(chat_id: ChatId) -> String {
    format!("{CHAT_KEY_PREFIX}{chat_id}")
}

pub fn message_key(chat_id: ChatId, message_id: MessageId) -> String {
    format!("{MESSAGE_KEY_PREFIX}{chat_id}_{message_id}")
}

/// Prefix covering every message record of one chat
pub fn chat_messages_prefix(chat_id: ChatId) -> String {
    format!("{MESSAGE_KEY_PREFIX}{chat_id}_")
}
