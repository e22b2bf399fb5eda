//! In-memory credential backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialBackend, WorkspaceCredential};
use crate::error::BotResult;

/// Backend keeping items in a process-local map. Contents are lost on
/// restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RwLock<HashMap<(String, String), WorkspaceCredential>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items across all tables.
    pub async fn item_count(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn get_item(
        &self,
        table: &str,
        team_id: &str,
    ) -> BotResult<Option<WorkspaceCredential>> {
        let items = self.items.read().await;
        Ok(items
            .get(&(table.to_string(), team_id.to_string()))
            .cloned())
    }

    async fn put_item(&self, table: &str, credential: &WorkspaceCredential) -> BotResult<()> {
        let mut items = self.items.write().await;
        items.insert(
            (table.to_string(), credential.team_id.clone()),
            credential.clone(),
        );
        Ok(())
    }
}
