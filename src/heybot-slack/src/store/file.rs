//! File-backed credential backend.
//!
//! Stores one JSON document per workspace at `<root>/<table>/<team_id>.json`.
//! Writers hold an exclusive lock and fsync before releasing it; readers
//! hold a shared lock, so a reader never observes a half-written item.

use std::fs;
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, info};

use super::{CredentialBackend, WorkspaceCredential};
use crate::error::{BotError, BotResult};

/// Longest accepted table name or team ID.
const MAX_KEY_LEN: usize = 128;

/// Backend persisting items as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> BotResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            BotError::Store(format!("cannot create store directory {:?}: {}", root, e))
        })?;

        info!("Credential store initialized at {:?}", root);
        Ok(Self { root })
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> BotResult<PathBuf> {
        if !is_valid_key(table) {
            return Err(BotError::Store(format!("invalid table name: {:?}", table)));
        }
        Ok(self.root.join(table))
    }
}

/// Keys become path components, so only a conservative character set is
/// accepted.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn read_item(path: &Path) -> BotResult<Option<WorkspaceCredential>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BotError::Store(format!("cannot open {:?}: {}", path, e))),
    };

    file.lock_shared()
        .map_err(|e| BotError::Store(format!("cannot lock {:?}: {}", path, e)))?;

    let result = serde_json::from_reader(BufReader::new(&file))
        .map_err(|e| BotError::Store(format!("corrupt item {:?}: {}", path, e)));

    // Lock is also released when the file is dropped.
    let _ = file.unlock();

    result.map(Some)
}

fn write_item(path: &Path, credential: &WorkspaceCredential) -> BotResult<()> {
    let store_err = |e: std::io::Error| BotError::Store(format!("cannot write {:?}: {}", path, e));

    let json = serde_json::to_vec_pretty(credential)
        .map_err(|e| BotError::Store(format!("cannot serialize item: {}", e)))?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(store_err)?;

    file.lock_exclusive().map_err(store_err)?;

    let result = (|| {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&json)?;
        file.sync_all()
    })()
    .map_err(store_err);

    let _ = file.unlock();
    result
}

#[async_trait]
impl CredentialBackend for FileBackend {
    async fn get_item(
        &self,
        table: &str,
        team_id: &str,
    ) -> BotResult<Option<WorkspaceCredential>> {
        // A key outside the accepted set can never have been written.
        if !is_valid_key(team_id) {
            debug!("Rejecting lookup for invalid team id {:?}", team_id);
            return Ok(None);
        }

        let path = self.table_dir(table)?.join(format!("{}.json", team_id));
        tokio::task::spawn_blocking(move || read_item(&path))
            .await
            .map_err(|e| BotError::Store(format!("read task failed: {}", e)))?
    }

    async fn put_item(&self, table: &str, credential: &WorkspaceCredential) -> BotResult<()> {
        if !is_valid_key(&credential.team_id) {
            return Err(BotError::Store(format!(
                "invalid team id: {:?}",
                credential.team_id
            )));
        }

        let dir = self.table_dir(table)?;
        let path = dir.join(format!("{}.json", credential.team_id));
        let credential = credential.clone();

        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&dir).map_err(|e| {
                BotError::Store(format!("cannot create table directory {:?}: {}", dir, e))
            })?;
            write_item(&path, &credential)?;
            debug!("Saved credential for team {} to {:?}", credential.team_id, path);
            Ok(())
        })
        .await
        .map_err(|e| BotError::Store(format!("write task failed: {}", e)))?
    }
}
