//! Session restore guarded by an epoch token.
//!
//! A restore captures the epoch when it starts and re-checks it around every
//! suspension point. A reset advances the epoch, so a restore that was already
//! in flight finishes its I/O but never touches the document.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::background::BackgroundImage;
use crate::error::{EditorError, Result};
use crate::fonts::FontCatalog;
use crate::layers::Layer;
use crate::persistence::PersistenceAdapter;
use crate::snapshot;

/// Monotonic counter bumped by every reset.
#[derive(Debug, Clone, Default)]
pub struct RestoreEpoch(Arc<AtomicU64>);

impl RestoreEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidate every token captured so far. Returns the new epoch.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn capture(&self) -> EpochToken {
        EpochToken {
            epoch: self.clone(),
            captured: self.current(),
        }
    }
}

/// Epoch value observed when an operation started.
#[derive(Debug, Clone)]
pub struct EpochToken {
    epoch: RestoreEpoch,
    captured: u64,
}

impl EpochToken {
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.captured
    }

    pub fn check(&self) -> Result<()> {
        let current = self.epoch.current();
        if current == self.captured {
            Ok(())
        } else {
            Err(EditorError::StaleRestore {
                captured: self.captured,
                current,
            })
        }
    }
}

/// Everything a restore resolved, ready to apply synchronously.
#[derive(Debug)]
pub struct PreparedRestore {
    pub token: EpochToken,
    pub background: Option<BackgroundImage>,
    pub layers: Option<Vec<Layer>>,
}

/// Loads and decodes the persisted design without touching the document.
pub struct RestoreTask {
    token: EpochToken,
    persistence: PersistenceAdapter,
    fonts: Arc<dyn FontCatalog>,
}

impl RestoreTask {
    pub fn new(token: EpochToken, persistence: PersistenceAdapter, fonts: Arc<dyn FontCatalog>) -> Self {
        Self {
            token,
            persistence,
            fonts,
        }
    }

    /// Resolve the saved background and layers.
    ///
    /// Fails only with [`EditorError::StaleRestore`]. A background or snapshot
    /// that can't be decoded is logged and left out.
    pub async fn run(self) -> Result<PreparedRestore> {
        let mut prepared = PreparedRestore {
            token: self.token.clone(),
            background: None,
            layers: None,
        };
        let Some(saved) = self.persistence.load().await else {
            return Ok(prepared);
        };

        if let Some(data_url) = saved.background_data_url {
            match BackgroundImage::from_data_url(data_url).await {
                Ok(background) => {
                    self.token.check()?;
                    prepared.background = Some(background);
                }
                Err(e) => tracing::warn!("Skipping saved background: {e}"),
            }
        }

        if let Some(saved_snapshot) = saved.snapshot {
            self.token.check()?;
            match snapshot::decode_layers(&saved_snapshot, self.fonts.as_ref()).await {
                Ok(layers) => {
                    self.token.check()?;
                    prepared.layers = Some(layers);
                }
                Err(e) => tracing::warn!("Skipping saved snapshot: {e}"),
            }
        }

        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::png_bytes;
    use crate::fonts::StaticFontCatalog;
    use crate::persistence::{MemoryStorage, PersistedDesign, Storage};
    use crate::snapshot::Snapshot;

    #[test]
    fn advancing_invalidates_tokens() {
        let epoch = RestoreEpoch::new();
        let token = epoch.capture();
        assert!(token.check().is_ok());
        assert_eq!(epoch.advance(), 1);
        assert!(!token.is_current());
        assert!(matches!(
            token.check(),
            Err(EditorError::StaleRestore { captured: 0, current: 1 })
        ));
    }

    #[tokio::test]
    async fn nothing_saved_prepares_nothing() {
        let persistence = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        let task = RestoreTask::new(RestoreEpoch::new().capture(), persistence, Arc::new(StaticFontCatalog::default()));
        let prepared = task.run().await.unwrap();
        assert!(prepared.background.is_none());
        assert!(prepared.layers.is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_skipped() {
        let persistence = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        persistence
            .save(&PersistedDesign {
                background_data_url: None,
                snapshot: Some(Snapshot::from_raw("][")),
            })
            .await;
        let task = RestoreTask::new(RestoreEpoch::new().capture(), persistence, Arc::new(StaticFontCatalog::default()));
        let prepared = task.run().await.unwrap();
        assert!(prepared.layers.is_none());
    }

    /// Storage whose reads race a reset.
    struct ResetOnRead {
        inner: MemoryStorage,
        epoch: RestoreEpoch,
    }

    #[async_trait::async_trait]
    impl Storage for ResetOnRead {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.epoch.advance();
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn reset_during_background_decode_discards_it() {
        let epoch = RestoreEpoch::new();
        let storage = Arc::new(ResetOnRead {
            inner: MemoryStorage::new(),
            epoch: epoch.clone(),
        });
        let background = BackgroundImage::from_bytes(png_bytes(8, 8)).await.unwrap();
        let persistence = PersistenceAdapter::new(storage.clone());
        storage
            .inner
            .set(
                crate::persistence::AUTOSAVE_KEY,
                &serde_json::to_string(&PersistedDesign {
                    background_data_url: Some(background.data_url),
                    snapshot: None,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let task = RestoreTask::new(epoch.capture(), persistence, Arc::new(StaticFontCatalog::default()));
        assert!(matches!(
            task.run().await,
            Err(EditorError::StaleRestore { captured: 0, current: 1 })
        ));
    }

    #[tokio::test]
    async fn saved_background_is_prepared() {
        let persistence = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        let background = BackgroundImage::from_bytes(png_bytes(12, 9)).await.unwrap();
        persistence
            .save(&PersistedDesign {
                background_data_url: Some(background.data_url.clone()),
                snapshot: None,
            })
            .await;
        let task = RestoreTask::new(RestoreEpoch::new().capture(), persistence, Arc::new(StaticFontCatalog::default()));
        let prepared = task.run().await.unwrap();
        assert_eq!(prepared.background, Some(background));
        assert!(prepared.layers.is_none());
    }

    #[tokio::test]
    async fn stale_token_aborts() {
        let persistence = PersistenceAdapter::new(Arc::new(MemoryStorage::new()));
        persistence
            .save(&PersistedDesign {
                background_data_url: None,
                snapshot: Some(Snapshot::from_raw(r#"{"version":1,"layers":[]}"#)),
            })
            .await;
        let epoch = RestoreEpoch::new();
        let task = RestoreTask::new(epoch.capture(), persistence, Arc::new(StaticFontCatalog::default()));
        epoch.advance();
        assert!(matches!(task.run().await, Err(EditorError::StaleRestore { .. })));
    }
}
