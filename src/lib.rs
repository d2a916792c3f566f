// Domain model and errors
pub mod duration;
pub mod error;
pub mod models;

// Storage
pub mod database;

// Retention engine
pub mod collector;
pub mod commands;
pub mod config_store;
pub mod ingest;
pub mod registry;

// Platform
pub mod discord;
pub mod messenger;

// Process settings
pub mod config;

pub use collector::{Collector, SweepReport};
pub use commands::{Command, CommandEvent, CommandProcessor};
pub use config::Settings;
pub use config_store::{ConfigStore, StatusChange};
pub use database::{Database, KeyValueStore};
pub use ingest::{InboundEvent, IngestionPipeline};
pub use messenger::{DeleteOutcome, Messenger, SentMessage};
pub use registry::MessageRegistry;
