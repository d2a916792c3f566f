//! Discord adapter: a chat is a channel, a group is any guild channel.

use crate::commands::Command;
use crate::ingest::InboundEvent;
use crate::messenger::{DeleteOutcome, Messenger, SentMessage};
use crate::models::{ChatId, MessageId};
use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use serenity::http::{Http, HttpError};
use serenity::model::channel::{Channel, Message};
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId};
use serenity::prelude::Context;
use std::sync::Arc;

pub struct DiscordMessenger {
    http: Arc<Http>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordMessenger { http }
    }
}

#[async_trait]
impl Messenger for DiscordMessenger {
    async fn send_reply(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<SentMessage> {
        let channel = ChannelId(chat_id as u64);
        let reference = (channel, DiscordMessageId(reply_to as u64));

        let sent = channel
            .send_message(&self.http, |m| m.content(text).reference_message(reference))
            .await?;

        Ok(SentMessage {
            message_id: sent.id.0 as MessageId,
            timestamp: sent.timestamp.unix_timestamp(),
        })
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> DeleteOutcome {
        match ChannelId(chat_id as u64)
            .delete_message(&self.http, DiscordMessageId(message_id as u64))
            .await
        {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) => classify_delete_error(e),
        }
    }
}

fn classify_delete_error(error: serenity::Error) -> DeleteOutcome {
    if let serenity::Error::Http(http_error) = &error {
        if let HttpError::UnsuccessfulRequest(response) = http_error.as_ref() {
            if response.status_code.as_u16() == 404 {
                return DeleteOutcome::NotFound;
            }
        }
    }
    DeleteOutcome::Failed(error.to_string())
}

/// Convert a gateway message into an inbound event.
///
/// The channel title is only looked up for `on`, the one command that stores it.
pub async fn inbound_event(ctx: &Context, msg: &Message, prefix: &str) -> InboundEvent {
    let command = Command::from_text(&msg.content, prefix);

    let title = match command {
        Some(Command::On) => channel_title(ctx, msg.channel_id).await,
        _ => String::new(),
    };

    InboundEvent {
        chat_id: msg.channel_id.0 as ChatId,
        message_id: msg.id.0 as MessageId,
        timestamp: msg.timestamp.unix_timestamp(),
        is_group: msg.guild_id.is_some(),
        title,
        command,
    }
}

async fn channel_title(ctx: &Context, channel_id: ChannelId) -> String {
    match channel_id.to_channel(ctx).await {
        Ok(Channel::Guild(channel)) => channel.name,
        Ok(_) => String::new(),
        Err(e) => {
            warn!("Failed to fetch channel {channel_id}: {e}");
            String::new()
        }
    }
}
