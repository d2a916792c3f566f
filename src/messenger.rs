//! Outbound side of the messaging platform: replies and deletions.

use crate::models::{ChatId, MessageId};
use anyhow::Result;
use async_trait::async_trait;

/// Identity of a message the bot just posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: MessageId,
    /// Unix seconds, as reported by the platform
    pub timestamp: i64,
}

/// Result of asking the platform to delete a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The platform no longer has the message
    NotFound,
    Failed(String),
}

impl DeleteOutcome {
    /// Whether the local record may be dropped
    pub fn is_gone(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted | DeleteOutcome::NotFound)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_reply(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<SentMessage>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> DeleteOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_gone() {
        assert!(DeleteOutcome::Deleted.is_gone());
        assert!(DeleteOutcome::NotFound.is_gone());
        assert!(!DeleteOutcome::Failed("HTTP 500".to_string()).is_gone());
    }
}
