use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

pub const INBOX: &str = "INBOX";
pub const DRAFTS: &str = "DRAFTS";

/// Errors reported by a mail store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mail store backend error: {0}")]
    Backend(String),
}

/// A stored mail message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// Boundary to the per-user encrypted mail store.
///
/// The real store belongs to the provider's crypto/sync library; this crate
/// only writes the welcome mail and reads folders for derived services.
#[async_trait]
pub trait MailStore: Send + Sync {
    async fn add_message(&self, folder: &str, message: Message) -> Result<(), StoreError>;

    /// Messages in a folder, oldest first. Unknown folders read as empty.
    async fn messages(&self, folder: &str) -> Result<Vec<Message>, StoreError>;
}

/// In-memory mail store backing the dev provider and the test suite.
#[derive(Debug, Default)]
pub struct MemoryMailStore {
    folders: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn add_message(&self, folder: &str, message: Message) -> Result<(), StoreError> {
        let mut folders = self.folders.write().await;
        folders.entry(folder.to_string()).or_default().push(message);
        Ok(())
    }

    async fn messages(&self, folder: &str) -> Result<Vec<Message>, StoreError> {
        let folders = self.folders.read().await;
        Ok(folders.get(folder).cloned().unwrap_or_default())
    }
}
