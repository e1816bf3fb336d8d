//! Session persistence for the last known good design.
//!
//! Persistence is an optimization: every failure here is logged and swallowed,
//! so a broken store degrades the editor to a non-persistent session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::EditorError;
use crate::snapshot::Snapshot;

/// Storage key of the autosaved design.
pub const AUTOSAVE_KEY: &str = "overlay_autosave_v1";

/// Durable record of the latest committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDesign {
    #[serde(rename = "backgroundDataURL")]
    pub background_data_url: Option<String>,
    pub snapshot: Option<Snapshot>,
}

/// Durable key-value storage.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read from {:?}", path)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {:?}", self.dir))?;
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .with_context(|| format!("Failed to save to {:?}", path))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove {:?}", path))
            }
            _ => Ok(()),
        }
    }
}

/// In-process storage; writes can be made to fail to simulate a full quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("storage quota exceeded"));
        }
        self.entries()?.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Saves, loads and clears the persisted design under a single key.
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn Storage>,
    key: String,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, AUTOSAVE_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Best effort; failures are logged.
    pub async fn save(&self, design: &PersistedDesign) {
        let result = match serde_json::to_string(design) {
            Ok(json) => self.storage.set(&self.key, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!("Autosave failed: {}", EditorError::StorageUnavailable(e));
        }
    }

    /// `None` when nothing is stored or the stored value can't be read.
    pub async fn load(&self) -> Option<PersistedDesign> {
        let raw = match self.storage.get(&self.key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Loading saved design failed: {}", EditorError::StorageUnavailable(e));
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(design) => Some(design),
            Err(e) => {
                tracing::warn!("Ignoring unreadable saved design: {e}");
                None
            }
        }
    }

    /// Best effort; idempotent.
    pub async fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key).await {
            tracing::warn!("Clearing saved design failed: {}", EditorError::StorageUnavailable(e));
        }
    }
}

/// Commands from the editor to the autosave task
#[derive(Debug)]
pub enum AutosaveCommand {
    Save(PersistedDesign),
    Clear,
    /// Reply once every earlier command has been applied
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle for the background task that writes designs in commit order.
#[derive(Debug, Clone)]
pub struct AutosaveHandle {
    command_tx: mpsc::UnboundedSender<AutosaveCommand>,
}

impl AutosaveHandle {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(adapter: PersistenceAdapter) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_autosave(adapter, command_rx));
        Self { command_tx }
    }

    pub fn save(&self, design: PersistedDesign) {
        self.send(AutosaveCommand::Save(design));
    }

    pub fn clear(&self) {
        self.send(AutosaveCommand::Clear);
    }

    /// Wait until all queued writes have reached storage.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(AutosaveCommand::Flush(done_tx));
        let _ = done_rx.await;
    }

    pub fn shutdown(&self) {
        self.send(AutosaveCommand::Shutdown);
    }

    fn send(&self, cmd: AutosaveCommand) {
        if self.command_tx.send(cmd).is_err() {
            tracing::debug!("autosave task stopped; dropping command");
        }
    }
}

async fn run_autosave(
    adapter: PersistenceAdapter,
    mut command_rx: mpsc::UnboundedReceiver<AutosaveCommand>,
) {
    let mut lookahead = None;
    loop {
        let cmd = match lookahead.take() {
            Some(cmd) => cmd,
            None => match command_rx.recv().await {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match cmd {
            AutosaveCommand::Save(mut design) => {
                // Only the newest of consecutive queued saves is written
                while let Ok(queued) = command_rx.try_recv() {
                    match queued {
                        AutosaveCommand::Save(newer) => design = newer,
                        other => {
                            lookahead = Some(other);
                            break;
                        }
                    }
                }
                adapter.save(&design).await;
            }
            AutosaveCommand::Clear => adapter.clear().await,
            AutosaveCommand::Flush(done) => {
                let _ = done.send(());
            }
            AutosaveCommand::Shutdown => break,
        }
    }
    tracing::debug!("autosave task finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> PersistedDesign {
        PersistedDesign {
            background_data_url: Some("data:image/png;base64,AAAA".to_string()),
            snapshot: Some(Snapshot::from_raw("{\"version\":1,\"layers\":[]}")),
        }
    }

    #[tokio::test]
    async fn saves_and_loads_payload() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        adapter.save(&design()).await;
        assert_eq!(adapter.load().await, Some(design()));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        adapter.save(&design()).await;
        adapter.clear().await;
        adapter.clear().await;
        assert_eq!(adapter.load().await, None);
    }

    #[tokio::test]
    async fn failed_writes_are_swallowed() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_writes(true);
        let adapter = PersistenceAdapter::new(storage);
        adapter.save(&design()).await;
        assert_eq!(adapter.load().await, None);
    }

    #[tokio::test]
    async fn unreadable_value_loads_as_none() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTOSAVE_KEY, "{not json").await.unwrap();
        let adapter = PersistenceAdapter::new(storage);
        assert_eq!(adapter.load().await, None);
    }

    #[tokio::test]
    async fn wire_format_uses_camel_case_background_key() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone());
        adapter.save(&PersistedDesign::default()).await;
        let raw = storage.get(AUTOSAVE_KEY).await.unwrap().unwrap();
        assert_eq!(raw, r#"{"backgroundDataURL":null,"snapshot":null}"#);
    }

    #[tokio::test]
    async fn file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.set("k", "value").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("value"));
        storage.remove("k").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn autosave_applies_commands_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let handle = AutosaveHandle::spawn(PersistenceAdapter::new(storage.clone()));
        handle.save(design());
        handle.clear();
        handle.save(PersistedDesign::default());
        handle.flush().await;

        let adapter = PersistenceAdapter::new(storage);
        assert_eq!(adapter.load().await, Some(PersistedDesign::default()));
        handle.shutdown();
    }

    #[tokio::test]
    async fn queued_saves_collapse_into_the_newest() {
        let storage = Arc::new(MemoryStorage::new());
        let handle = AutosaveHandle::spawn(PersistenceAdapter::new(storage.clone()));
        for _ in 0..5 {
            handle.save(design());
        }
        handle.save(PersistedDesign::default());
        handle.clear();
        handle.save(design());
        handle.flush().await;

        assert_eq!(storage.write_count(), 2);
        let adapter = PersistenceAdapter::new(storage);
        assert_eq!(adapter.load().await, Some(design()));
        handle.shutdown();
    }
}
