//! # Asset Store Repairer Module
//!
//! Riallinea un'entry dell'asset store con i byte su disco dopo che il
//! provider ha riscritto il file fuori banda.
//!
//! ## Esiti:
//! - `NotFound`: nessuna entry per il filename (o file su disco assente)
//! - `Healthy`: contenuto già consistente, nessuna operazione
//! - `Recovered`: re-ingest, rigenerazione derivati, re-publish se pubblicata
//!
//! L'operazione è idempotente: due repair consecutivi sullo stesso file
//! stale danno `Recovered` e poi `Healthy`.

use crate::{asset_store::AssetStore, optimizer::path_resolver::PathResolver};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result of one repair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    Healthy,
    Recovered,
    NotFound,
}

impl fmt::Display for RepairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Healthy => "healthy",
            Self::Recovered => "recovered",
            Self::NotFound => "not_found",
        };
        f.pad(name)
    }
}

/// Reconciles one managed file with its on-disk bytes
#[async_trait]
pub trait AssetRepair: Send + Sync {
    async fn repair(&self, relative_filename: &str) -> Result<RepairOutcome>;
}

pub struct AssetStoreRepairer {
    store: Arc<dyn AssetStore>,
}

impl AssetStoreRepairer {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AssetRepair for AssetStoreRepairer {
    async fn repair(&self, relative_filename: &str) -> Result<RepairOutcome> {
        let filename = PathResolver::canonical_filename(relative_filename);

        let mut entry = match self.store.find_by_filename(&filename).await? {
            Some(entry) => entry,
            None => return Ok(RepairOutcome::NotFound),
        };

        if self.store.content_exists(&entry).await? {
            return Ok(RepairOutcome::Healthy);
        }

        if !self.store.local_file_exists(&entry).await {
            debug!("{} has no bytes on disk to re-ingest", filename);
            return Ok(RepairOutcome::NotFound);
        }

        let was_published = self.store.is_published(&entry);

        self.store.replace_from_local(&mut entry).await?;
        self.store.regenerate_derived(&mut entry).await?;
        self.store.write(&entry).await?;

        if was_published {
            self.store.publish_recursive(&mut entry).await?;
        }

        Ok(RepairOutcome::Recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::FsAssetStore;
    use tempfile::TempDir;

    async fn setup(temp_dir: &TempDir, publish: bool) -> (Arc<FsAssetStore>, AssetStoreRepairer) {
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("Uploads")).unwrap();
        std::fs::write(root.join("Uploads/a.txt"), b"original").unwrap();

        let store = Arc::new(
            FsAssetStore::open(root, &root.join(".assetstore.json"))
                .await
                .unwrap(),
        );
        store.register("Uploads/a.txt", publish).await.unwrap();
        let repairer = AssetStoreRepairer::new(store.clone());
        (store, repairer)
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let (_, repairer) = setup(&temp_dir, false).await;
        assert_eq!(repairer.repair("Uploads/missing.txt").await.unwrap(), RepairOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_healthy_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let (store, repairer) = setup(&temp_dir, false).await;
        let before = store.find_by_filename("Uploads/a.txt").await.unwrap();

        assert_eq!(repairer.repair("Uploads/a.txt").await.unwrap(), RepairOutcome::Healthy);
        assert_eq!(store.find_by_filename("Uploads/a.txt").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_stale_file_recovers_then_is_healthy() {
        let temp_dir = TempDir::new().unwrap();
        let (store, repairer) = setup(&temp_dir, true).await;
        std::fs::write(temp_dir.path().join("Uploads/a.txt"), b"optimized").unwrap();

        assert_eq!(repairer.repair("Uploads/a.txt").await.unwrap(), RepairOutcome::Recovered);
        assert_eq!(repairer.repair("Uploads/a.txt").await.unwrap(), RepairOutcome::Healthy);

        let entry = store.find_by_filename("Uploads/a.txt").await.unwrap().unwrap();
        assert!(entry.published);
        assert_eq!(entry.published_hash.as_deref(), Some(entry.file_hash.as_str()));
    }

    #[tokio::test]
    async fn test_unpublished_entry_stays_unpublished() {
        let temp_dir = TempDir::new().unwrap();
        let (store, repairer) = setup(&temp_dir, false).await;
        std::fs::write(temp_dir.path().join("Uploads/a.txt"), b"optimized").unwrap();

        assert_eq!(repairer.repair("Uploads/a.txt").await.unwrap(), RepairOutcome::Recovered);
        let entry = store.find_by_filename("Uploads/a.txt").await.unwrap().unwrap();
        assert!(!entry.published);
        assert_eq!(entry.published_hash, None);
    }

    #[tokio::test]
    async fn test_hashed_path_resolves_to_entry() {
        let temp_dir = TempDir::new().unwrap();
        let (_, repairer) = setup(&temp_dir, false).await;
        std::fs::write(temp_dir.path().join("Uploads/a.txt"), b"optimized").unwrap();

        assert_eq!(
            repairer.repair(".protected/Uploads/0a1b2c3d4e/a.txt").await.unwrap(),
            RepairOutcome::Recovered
        );
    }

    #[tokio::test]
    async fn test_deleted_bytes_are_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let (_, repairer) = setup(&temp_dir, false).await;
        std::fs::remove_file(temp_dir.path().join("Uploads/a.txt")).unwrap();

        assert_eq!(repairer.repair("Uploads/a.txt").await.unwrap(), RepairOutcome::NotFound);
    }
}
