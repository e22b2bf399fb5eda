//! Workspace credential storage.
//!
//! A [`WorkspaceCredential`] is written once per successful installation
//! and read on every event delivered for that workspace. There is no cache:
//! each `get` is a fresh read from the backend.
//!
//! Two store strategies implement [`CredentialStore`]:
//! - [`TableStore`] validates and forwards to a durable [`CredentialBackend`]
//! - [`OfflineStore`] answers every `get` with a sentinel credential, for
//!   local development only

mod file;
mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{BotError, BotResult};
use crate::oauth::AuthorizationResult;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Token handed out by [`OfflineStore`].
pub const OFFLINE_BOT_TOKEN: &str = "xoxb-offline";

/// Default timeout for a single backend call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bot credential of one installed workspace.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCredential {
    /// Workspace ID (store key).
    pub team_id: String,
    /// Workspace name.
    #[serde(default)]
    pub team_name: String,
    /// Bot access token (xoxb-...).
    pub bot_access_token: String,
    /// Scopes granted.
    #[serde(default)]
    pub scope: String,
}

impl std::fmt::Debug for WorkspaceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceCredential")
            .field("team_id", &self.team_id)
            .field("team_name", &self.team_name)
            .field("bot_access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl WorkspaceCredential {
    /// Check that the credential may be persisted.
    pub fn validate(&self) -> BotResult<()> {
        if self.team_id.trim().is_empty() {
            return Err(BotError::InvalidCredential(
                "No team ID provided.".to_string(),
            ));
        }
        if self.bot_access_token.trim().is_empty() {
            return Err(BotError::InvalidCredential(
                "No access token provided.".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&AuthorizationResult> for WorkspaceCredential {
    fn from(payload: &AuthorizationResult) -> Self {
        Self {
            team_id: payload.team_id.clone().unwrap_or_default(),
            team_name: payload.team_name.clone().unwrap_or_default(),
            bot_access_token: payload.bot_access_token().unwrap_or_default().to_string(),
            scope: payload.scope.clone().unwrap_or_default(),
        }
    }
}

/// Key-value persistence for workspace credentials.
///
/// Implementations provide per-key atomicity: a completed `put_item` is
/// visible to every later `get_item` for the same key.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Read the item stored under `team_id` in `table`.
    async fn get_item(&self, table: &str, team_id: &str)
    -> BotResult<Option<WorkspaceCredential>>;

    /// Insert or replace the item keyed by `credential.team_id` in `table`.
    async fn put_item(&self, table: &str, credential: &WorkspaceCredential) -> BotResult<()>;
}

/// Credential lookup and persistence used by the request router.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the credential for `team_id`; `NotFound` if the workspace never
    /// completed installation.
    async fn get(&self, team_id: &str) -> BotResult<WorkspaceCredential>;

    /// Validate and upsert `credential`. Returns after the backend confirms
    /// the write.
    async fn put(&self, credential: WorkspaceCredential) -> BotResult<()>;
}

/// Store writing to a named table of a durable backend.
#[derive(Clone)]
pub struct TableStore {
    backend: Arc<dyn CredentialBackend>,
    table: String,
    timeout: Duration,
}

impl std::fmt::Debug for TableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TableStore {
    /// Create a store over `table` in `backend`.
    pub fn new(backend: Arc<dyn CredentialBackend>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = BotResult<T>>,
    ) -> BotResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BotError::Store(format!(
                "{} timed out after {:?}",
                operation, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl CredentialStore for TableStore {
    async fn get(&self, team_id: &str) -> BotResult<WorkspaceCredential> {
        debug!(
            "Retrieving access token for team {} in table {}",
            team_id, self.table
        );

        let item = self
            .bounded("get", self.backend.get_item(&self.table, team_id))
            .await
            .inspect_err(|e| error!("Error retrieving OAuth access token: {}", e))?;

        item.ok_or_else(|| BotError::NotFound(team_id.to_string()))
    }

    async fn put(&self, credential: WorkspaceCredential) -> BotResult<()> {
        credential.validate()?;

        debug!(
            "Storing access token for team {} in table {}",
            credential.team_id, self.table
        );

        self.bounded("put", self.backend.put_item(&self.table, &credential))
            .await
            .inspect_err(|e| error!("Error storing OAuth access token: {}", e))
    }
}

/// Offline stand-in: writes go to memory, reads return a sentinel.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    inner: TableStore,
}

impl OfflineStore {
    /// Create an offline store.
    pub fn new() -> Self {
        Self {
            inner: TableStore::new(Arc::new(MemoryBackend::new()), "offline"),
        }
    }

    /// The credential returned for every workspace.
    pub fn sentinel(team_id: &str) -> WorkspaceCredential {
        WorkspaceCredential {
            team_id: team_id.to_string(),
            team_name: "offline".to_string(),
            bot_access_token: OFFLINE_BOT_TOKEN.to_string(),
            scope: String::new(),
        }
    }
}

impl Default for OfflineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for OfflineStore {
    async fn get(&self, team_id: &str) -> BotResult<WorkspaceCredential> {
        debug!("Returning offline credential for team {}", team_id);
        Ok(Self::sentinel(team_id))
    }

    async fn put(&self, credential: WorkspaceCredential) -> BotResult<()> {
        self.inner.put(credential).await
    }
}
