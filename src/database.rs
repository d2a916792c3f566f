use anyhow::Result;
use async_trait::async_trait;
use log::info;
use sqlite::{Connection, State};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Minimal key-value capability the retention engine persists through.
///
/// Keys are namespaced strings (`chat_<id>`, `msg_<chat>_<msg>`), values are
/// opaque bytes. Deleting a missing key is not an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, ordered by key
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        let connection = sqlite::open(database_path)?;
        let db = Database {
            connection: Arc::new(Mutex::new(connection)),
        };

        db.init_tables().await?;
        info!("Database initialized at: {database_path}");
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        let conn = self.connection.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)",
        )?;
        statement.bind((1, key))?;
        statement.bind((2, value))?;
        statement.next()?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT value FROM kv_store WHERE key = ?")?;
        statement.bind((1, key))?;

        if let State::Row = statement.next()? {
            Ok(Some(statement.read::<Vec<u8>, _>("value")?))
        } else {
            Ok(None)
        }
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let conn = self.connection.lock().await;
        // substr instead of LIKE: '_' in our key prefixes is a LIKE wildcard
        let mut statement = conn.prepare(
            "SELECT key, value FROM kv_store
             WHERE substr(key, 1, ?) = ?
             ORDER BY key",
        )?;
        statement.bind((1, prefix.len() as i64))?;
        statement.bind((2, prefix))?;

        let mut entries = Vec::new();
        while let State::Row = statement.next()? {
            let key = statement.read::<String, _>("key")?;
            let value = statement.read::<Vec<u8>, _>("value")?;
            entries.push((key, value));
        }

        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM kv_store WHERE key = ?")?;
        statement.bind((1, key))?;
        statement.next()?;
        Ok(())
    }
}
