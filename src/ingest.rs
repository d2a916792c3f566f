use crate::commands::{Command, CommandEvent};
use crate::config_store::ConfigStore;
use crate::models::{ChatId, MessageId};
use crate::registry::MessageRegistry;
use log::{debug, error, warn};
use tokio::sync::mpsc;

/// Platform-neutral view of one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Unix seconds
    pub timestamp: i64,
    /// Group chat as opposed to a private conversation with the bot
    pub is_group: bool,
    pub title: String,
    pub command: Option<Command>,
}

/// Records qualifying messages and hands commands to the processor queue
#[derive(Clone)]
pub struct IngestionPipeline {
    configs: ConfigStore,
    registry: MessageRegistry,
    commands: mpsc::UnboundedSender<CommandEvent>,
}

impl IngestionPipeline {
    pub fn new(
        configs: ConfigStore,
        registry: MessageRegistry,
        commands: mpsc::UnboundedSender<CommandEvent>,
    ) -> Self {
        IngestionPipeline {
            configs,
            registry,
            commands,
        }
    }

    pub async fn handle(&self, event: InboundEvent) {
        if event.is_group {
            let recorded = self
                .configs
                .when_enabled(event.chat_id, || {
                    self.registry
                        .record_message(event.chat_id, event.message_id, event.timestamp)
                })
                .await;

            match recorded {
                Some(Ok(())) => debug!(
                    "New message {} handled for chat {}",
                    event.message_id, event.chat_id
                ),
                Some(Err(e)) => error!("{e:#}"),
                None => debug!(
                    "Message {} not saved, chat {} is disabled or unconfigured",
                    event.message_id, event.chat_id
                ),
            }
        }

        let Some(command) = event.command else {
            return;
        };

        if !event.is_group && !command.allowed_in_private() {
            debug!(
                "Ignoring <{}> command in private chat {}",
                command.name(),
                event.chat_id
            );
            return;
        }

        let command_event = CommandEvent {
            chat_id: event.chat_id,
            message_id: event.message_id,
            timestamp: event.timestamp,
            title: event.title,
            command,
        };

        if let Err(e) = self.commands.send(command_event) {
            warn!("Failed to queue command: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use std::sync::Arc;

    async fn setup() -> (
        ConfigStore,
        MessageRegistry,
        IngestionPipeline,
        mpsc::UnboundedReceiver<CommandEvent>,
    ) {
        let db = Arc::new(Database::new(":memory:").await.unwrap());
        let configs = ConfigStore::new(db.clone(), 604800);
        let registry = MessageRegistry::new(db);
        let (sender, receiver) = mpsc::unbounded_channel();
        let pipeline = IngestionPipeline::new(configs.clone(), registry.clone(), sender);
        (configs, registry, pipeline, receiver)
    }

    fn message(chat_id: ChatId, message_id: MessageId, is_group: bool) -> InboundEvent {
        InboundEvent {
            chat_id,
            message_id,
            timestamp: 1_700_000_000,
            is_group,
            title: "general".to_string(),
            command: None,
        }
    }

    #[tokio::test]
    async fn test_records_only_enabled_groups() {
        let (configs, registry, pipeline, _receiver) = setup().await;

        pipeline.handle(message(1, 10, true)).await;
        assert!(registry.list_by_chat(1).await.unwrap().is_empty());

        configs.create(1, "general", 3600).await.unwrap();
        pipeline.handle(message(1, 11, true)).await;
        assert_eq!(registry.list_by_chat(1).await.unwrap().len(), 1);

        configs.change_status(1, false).await.unwrap();
        pipeline.handle(message(1, 12, true)).await;
        assert_eq!(registry.list_by_chat(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forwards_group_commands() {
        let (_configs, registry, pipeline, mut receiver) = setup().await;

        let mut event = message(7, 20, true);
        event.command = Some(Command::On);
        pipeline.handle(event).await;

        let queued = receiver.try_recv().unwrap();
        assert_eq!(queued.chat_id, 7);
        assert_eq!(queued.message_id, 20);
        assert_eq!(queued.command, Command::On);
        // Not recorded: the chat had no configuration yet
        assert!(registry.list_by_chat(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_chats_forward_only_basic_commands() {
        let (configs, registry, pipeline, mut receiver) = setup().await;
        configs.create(9, "dm", 3600).await.unwrap();

        for command in [Command::On, Command::Stop, Command::Unknown("x".to_string())] {
            let mut event = message(9, 1, false);
            event.command = Some(command);
            pipeline.handle(event).await;
        }
        assert!(receiver.try_recv().is_err());

        let mut event = message(9, 2, false);
        event.command = Some(Command::Help);
        pipeline.handle(event).await;
        assert_eq!(receiver.try_recv().unwrap().command, Command::Help);

        // Private messages are never recorded
        assert!(registry.list_by_chat(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_panic() {
        let (_configs, _registry, pipeline, receiver) = setup().await;
        drop(receiver);

        let mut event = message(1, 1, true);
        event.command = Some(Command::Ping);
        pipeline.handle(event).await;
    }
}
