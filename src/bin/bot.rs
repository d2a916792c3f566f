//! Discord gateway entry point
//!
//! Settings can come from:
//! - `--config <file>` or CONFIG_FILE (YAML)
//! - config.yaml in the working directory
//! - GC_* environment variables

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use log::{error, info};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use gcbot::commands::replies::{help_text, start_text};
use gcbot::config::Settings;
use gcbot::discord::{inbound_event, DiscordMessenger};
use gcbot::{Collector, CommandProcessor, ConfigStore, Database, IngestionPipeline, MessageRegistry};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Deletes chat messages once they outlive the channel's timeout",
    long_about = None
)]
struct Cli {
    /// Path to a YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print usage instructions and exit
    #[arg(long)]
    manual: bool,
}

struct Handler {
    pipeline: IngestionPipeline,
    prefix: String,
    /// Set on ready; the bot's own replies are tracked by the command processor
    own_id: AtomicU64,
}

impl Handler {
    fn new(pipeline: IngestionPipeline, prefix: String) -> Self {
        Handler {
            pipeline,
            prefix,
            own_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.id.0 == self.own_id.load(Ordering::Relaxed) {
            return;
        }

        let event = inbound_event(&ctx, &msg, &self.prefix).await;
        self.pipeline.handle(event).await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.own_id.store(ready.user.id.0, Ordering::Relaxed);
        info!("{} is connected and ready!", ready.user.name);
        info!("Connected to {} guilds", ready.guilds.len());
        info!("Bot ID: {}", ready.user.id);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    if cli.manual {
        let prefix = Settings::auto_load(cli.config.as_deref())
            .map(|settings| settings.command_prefix)
            .unwrap_or_else(|_| "/".to_string());
        println!("{}\n\n{}", start_text(&prefix), help_text(&prefix));
        return Ok(());
    }

    let settings = Settings::auto_load(cli.config.as_deref())?;

    // Set up logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log_level),
    )
    .init();

    info!("Starting gcbot {}...", env!("CARGO_PKG_VERSION"));

    let database = Arc::new(Database::new(&settings.database_path).await?);
    let configs = ConfigStore::load(database.clone(), settings.timeout_limit).await?;
    let registry = MessageRegistry::new(database);

    let (command_sender, command_receiver) = mpsc::unbounded_channel();
    let pipeline = IngestionPipeline::new(configs.clone(), registry.clone(), command_sender);
    let handler = Handler::new(pipeline, settings.command_prefix.clone());

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&settings.token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    let messenger = Arc::new(DiscordMessenger::new(client.cache_and_http.http.clone()));

    let processor = CommandProcessor::new(
        configs.clone(),
        registry.clone(),
        messenger.clone(),
        settings.default_timeout,
        &settings.command_prefix,
    );
    let processor_handle = tokio::spawn(processor.run(command_receiver));

    let collector = Collector::new(
        configs,
        registry,
        messenger,
        Duration::from_secs(settings.sleep_timeout),
    );
    let collector_handle = tokio::spawn(collector.run());

    // Set up Ctrl+C handler for graceful shutdown
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                shard_manager.lock().await.shutdown_all().await;
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
            }
        }
    });

    info!("Connecting to Discord gateway...");
    let result = client.start().await;

    processor_handle.abort();
    collector_handle.abort();

    result.map_err(|e| {
        error!("Gateway connection failed: {e}");
        anyhow::anyhow!("Gateway connection failed: {}", e)
    })?;

    info!("Bot shut down successfully");
    Ok(())
}
