//! # Feature: Command Processor
//!
//! Single consumer of the command queue. Each command is applied to the
//! configuration store and message registry before its reply is sent.

use super::{replies, Command};
use crate::collector::evict;
use crate::config_store::{ConfigStore, StatusChange};
use crate::duration::{format_duration, parse_timeout};
use crate::error::ConfigError;
use crate::messenger::{Messenger, SentMessage};
use crate::models::{ChatId, MessageId, MessageRecord};
use crate::registry::MessageRegistry;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A command together with the message that carried it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Unix seconds
    pub timestamp: i64,
    pub title: String,
    pub command: Command,
}

struct Reply {
    text: String,
    /// Record the reply even though the chat is no longer enabled
    always_record: bool,
}

impl Reply {
    fn new(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            always_record: false,
        }
    }

    fn recorded(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            always_record: true,
        }
    }
}

pub struct CommandProcessor {
    configs: ConfigStore,
    registry: MessageRegistry,
    messenger: Arc<dyn Messenger>,
    default_timeout: u64,
    prefix: String,
}

impl CommandProcessor {
    pub fn new(
        configs: ConfigStore,
        registry: MessageRegistry,
        messenger: Arc<dyn Messenger>,
        default_timeout: u64,
        prefix: &str,
    ) -> Self {
        CommandProcessor {
            configs,
            registry,
            messenger,
            default_timeout,
            prefix: prefix.to_string(),
        }
    }

    /// Drain the queue until every sender is dropped
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<CommandEvent>) {
        info!("Command processor started");

        while let Some(event) = receiver.recv().await {
            self.process(&event).await;
        }

        info!("Command queue closed, command processor stopped");
    }

    /// Execute one command and send its reply. Returns the reply text, if any.
    pub async fn process(&self, event: &CommandEvent) -> Option<String> {
        info!(
            "Received <{}> command from chat {}",
            event.command.name(),
            event.chat_id
        );

        let reply = self.execute(event).await?;
        self.send_reply(event, &reply).await;
        Some(reply.text)
    }

    async fn execute(&self, event: &CommandEvent) -> Option<Reply> {
        match &event.command {
            Command::Help => Some(Reply::new(replies::help_text(&self.prefix))),
            Command::Start => Some(Reply::new(replies::start_text(&self.prefix))),
            Command::Ping => Some(Reply::new(replies::PONG)),
            Command::On => self.turn_on(event).await,
            Command::Off => self.turn_off(event.chat_id).await,
            Command::Timeout(args) => self.change_timeout(event.chat_id, args).await,
            Command::Delete => {
                self.delete_all(event.chat_id).await;
                None
            }
            Command::Setting => self
                .configs
                .get(event.chat_id)
                .await
                .ok()
                .map(|config| Reply::new(config.describe())),
            Command::Stop => self.stop(event.chat_id).await,
            Command::Unknown(name) => {
                warn!("Received unknown command: {name}");
                Some(Reply::new(replies::unknown_command(&self.prefix)))
            }
        }
    }

    async fn turn_on(&self, event: &CommandEvent) -> Option<Reply> {
        let chat_id = event.chat_id;

        let text = match self.configs.get(chat_id).await {
            Err(_) => {
                let config = match self
                    .configs
                    .create(chat_id, &event.title, self.default_timeout)
                    .await
                {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Cannot create configuration for chat {chat_id}: {e}");
                        return None;
                    }
                };
                replies::created(&format_duration(config.timeout))
            }
            Ok(config) if !config.enabled => {
                if let Err(e) = self.configs.change_status(chat_id, true).await {
                    warn!("Cannot enable chat {chat_id}: {e}");
                    return None;
                }
                replies::ENABLED.to_string()
            }
            Ok(_) => return Some(Reply::new(replies::ALREADY_ENABLED)),
        };

        // The command itself was ingested before the chat was enabled
        self.record(chat_id, event.message_id, event.timestamp).await;
        Some(Reply::new(text))
    }

    async fn turn_off(&self, chat_id: ChatId) -> Option<Reply> {
        match self.configs.change_status(chat_id, false).await {
            Ok(StatusChange::Changed) => Some(Reply::recorded(replies::DISABLED)),
            Ok(StatusChange::Unchanged) => Some(Reply::new(replies::ALREADY_DISABLED)),
            Err(_) => None,
        }
    }

    async fn change_timeout(&self, chat_id: ChatId, args: &str) -> Option<Reply> {
        if !self.configs.exists(chat_id).await {
            return None;
        }

        let timeout = match parse_timeout(args) {
            Ok(timeout) => timeout,
            Err(e) => {
                warn!("Invalid timeout '{args}' for chat {chat_id}: {e}");
                return Some(Reply::new(replies::invalid_timeout(
                    &e.to_string(),
                    &self.prefix,
                )));
            }
        };

        match self.configs.change_timeout(chat_id, timeout).await {
            Ok(()) => Some(Reply::new(replies::TIMEOUT_CHANGED)),
            Err(ConfigError::Timeout(e)) => {
                warn!("Rejected timeout {timeout}s for chat {chat_id}: {e}");
                Some(Reply::new(replies::timeout_rejected(&e.to_string())))
            }
            Err(_) => None,
        }
    }

    /// Delete every tracked message of a chat. Returns the records whose remote delete failed.
    async fn delete_all(&self, chat_id: ChatId) -> Vec<MessageRecord> {
        if !self.configs.exists(chat_id).await {
            return Vec::new();
        }

        let records = match self.registry.list_by_chat(chat_id).await {
            Ok(records) => records,
            Err(e) => {
                error!("{e:#}");
                return Vec::new();
            }
        };

        let total = records.len();
        let mut failed = Vec::new();
        for record in records {
            if !evict(self.messenger.as_ref(), &self.registry, &record).await {
                failed.push(record);
            }
        }

        info!(
            "Deleted {} of {total} message(s) in chat {chat_id}",
            total - failed.len()
        );
        failed
    }

    async fn stop(&self, chat_id: ChatId) -> Option<Reply> {
        if !self.configs.exists(chat_id).await {
            return None;
        }

        // Disabling waits for in-flight ingestion writes and blocks new ones
        if let Err(e) = self.configs.change_status(chat_id, false).await {
            warn!("Cannot disable chat {chat_id} before stopping: {e}");
        }

        // Once the configuration is gone no sweep would retry these
        for record in self.delete_all(chat_id).await {
            warn!("Dropping record of undeleted message {record}");
            if let Err(e) = self
                .registry
                .delete_record(record.chat_id, record.message_id)
                .await
            {
                error!("{e:#}");
            }
        }

        self.configs.remove(chat_id).await;
        Some(Reply::new(replies::FAREWELL))
    }

    async fn send_reply(&self, event: &CommandEvent, reply: &Reply) -> Option<SentMessage> {
        let sent = match self
            .messenger
            .send_reply(event.chat_id, event.message_id, &reply.text)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                error!("Failed to send reply to message {}: {e:#}", event.message_id);
                return None;
            }
        };
        debug!("Reply to {} sent", event.message_id);

        if reply.always_record || self.configs.exists_enabled(event.chat_id).await {
            self.record(event.chat_id, sent.message_id, sent.timestamp).await;
        }

        Some(sent)
    }

    async fn record(&self, chat_id: ChatId, message_id: MessageId, timestamp: i64) {
        if let Err(e) = self
            .registry
            .record_message(chat_id, message_id, timestamp)
            .await
        {
            error!("{e:#}");
        }
    }
}
