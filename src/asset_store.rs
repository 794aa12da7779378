//! # Asset Store Module
//!
//! Questo modulo definisce lo store dei file gestiti che il repair riallinea.
//!
//! ## Responsabilità:
//! - Definisce il trait `AssetStore`, l'unica capacità usata dal repairer:
//!   lookup per filename, verifica contenuto, replace da file locale,
//!   rigenerazione dei derivati, write, publish
//! - Implementa `FsAssetStore`, uno store content-addressed su filesystem
//!
//! ## Strategia di `FsAssetStore`:
//! - Manifest JSON (`filename -> AssetEntry`) con l'hash SHA-256 registrato
//! - Il contenuto è consistente se `<root>/<filename>` esiste e il suo hash
//!   coincide con `file_hash`
//! - Se il provider riscrive i byte fuori banda, l'hash non coincide più:
//!   l'entry va re-ingerita
//! - Thumbnails rigenerati in `<root>/_resampled/<hash[..10]>/`
//! - Registrazione esplicita (`register_path`) o di tutte le immagini non
//!   ancora note (`register_missing`), escluso `_resampled`
//!
//! ## Esempio struttura manifest:
//! ```json
//! {
//!   "entries": {
//!     "Uploads/photo.jpg": {
//!       "filename": "Uploads/photo.jpg",
//!       "file_hash": "9f86d08...",
//!       "published": true,
//!       "published_hash": "9f86d08...",
//!       "variants": ["_resampled/9f86d0818b/photo-thumb.png"]
//!     }
//!   }
//! }
//! ```

use crate::file_manager::FileManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Folder holding derived artifacts, relative to the store root
pub const RESAMPLED_FOLDER: &str = "_resampled";

/// Thumbnail bounding box
pub const THUMBNAIL_SIZE: u32 = 200;

/// A managed file, keyed by its stable filename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub filename: String,
    pub file_hash: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub published_hash: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Capabilities the repairer needs from a managed file store
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn find_by_filename(&self, filename: &str) -> Result<Option<AssetEntry>>;

    /// Whether the recorded content matches what is on disk
    async fn content_exists(&self, entry: &AssetEntry) -> Result<bool>;

    /// Whether the bytes the entry should be ingested from are present
    async fn local_file_exists(&self, entry: &AssetEntry) -> bool;

    async fn replace_from_local(&self, entry: &mut AssetEntry) -> Result<()>;

    async fn regenerate_derived(&self, entry: &mut AssetEntry) -> Result<()>;

    async fn write(&self, entry: &AssetEntry) -> Result<()>;

    fn is_published(&self, entry: &AssetEntry) -> bool;

    async fn publish_recursive(&self, entry: &mut AssetEntry) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: BTreeMap<String, AssetEntry>,
}

/// Content-addressed store backed by files under a root folder
pub struct FsAssetStore {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: RwLock<Manifest>,
}

impl FsAssetStore {
    /// Open the store, starting empty when the manifest does not exist yet
    pub async fn open(root: &Path, manifest_path: &Path) -> Result<Self> {
        let manifest = if manifest_path.exists() {
            let content = fs::read_to_string(manifest_path).await?;
            serde_json::from_str(&content)?
        } else {
            Manifest::default()
        };

        let root = fs::canonicalize(root).await.unwrap_or_else(|_| root.to_path_buf());

        Ok(Self {
            root,
            manifest_path: manifest_path.to_path_buf(),
            manifest: RwLock::new(manifest),
        })
    }

    /// Ingest the file at `<root>/<filename>` as a new managed entry
    pub async fn register(&self, filename: &str, publish: bool) -> Result<AssetEntry> {
        let file_hash = FileManager::hash_file(&self.root.join(filename)).await?;
        let mut entry = AssetEntry {
            filename: filename.to_string(),
            file_hash,
            published: false,
            published_hash: None,
            variants: Vec::new(),
        };

        if publish {
            self.publish_recursive(&mut entry).await?;
        } else {
            self.write(&entry).await?;
        }

        Ok(entry)
    }

    /// Store filename of a file below the root. Relative paths are taken
    /// relative to the root.
    pub async fn filename_for(&self, path: &Path) -> Result<String> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let full = fs::canonicalize(&full)
            .await
            .with_context(|| format!("Cannot register {}", full.display()))?;

        let relative = full.strip_prefix(&self.root).map_err(|_| {
            anyhow::anyhow!("{} is outside the asset root {}", full.display(), self.root.display())
        })?;

        let filename = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        if filename.is_empty() {
            return Err(anyhow::anyhow!("{} is the asset root, not a file", full.display()));
        }
        Ok(filename)
    }

    /// Register a file given by path, absolute or relative to the root
    pub async fn register_path(&self, path: &Path, publish: bool) -> Result<AssetEntry> {
        let filename = self.filename_for(path).await?;
        self.register(&filename, publish).await
    }

    /// Register every image below the root the manifest does not know yet.
    /// Derived artifacts are never registered.
    pub async fn register_missing(&self, publish: bool) -> Result<Vec<AssetEntry>> {
        let mut registered = Vec::new();

        for path in FileManager::find_images(&self.root, &[RESAMPLED_FOLDER]) {
            let filename = self.filename_for(&path).await?;
            if self.find_by_filename(&filename).await?.is_some() {
                continue;
            }

            debug!("Registering {}", filename);
            registered.push(self.register(&filename, publish).await?);
        }

        Ok(registered)
    }

    fn local_path(&self, entry: &AssetEntry) -> PathBuf {
        self.root.join(&entry.filename)
    }

    async fn save(&self, manifest: &Manifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)?;
        FileManager::write_atomic(&self.manifest_path, content.into_bytes()).await
    }

    async fn create_thumbnail(source: PathBuf, target: PathBuf) -> Result<bool> {
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let image = match image::open(&source) {
                Ok(image) => image,
                Err(e) => {
                    warn!("No thumbnail for {}: {}", source.display(), e);
                    return Ok(false);
                }
            };

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            image
                .thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
                .save_with_format(&target, image::ImageFormat::Png)?;
            Ok(true)
        })
        .await?
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn find_by_filename(&self, filename: &str) -> Result<Option<AssetEntry>> {
        Ok(self.manifest.read().await.entries.get(filename).cloned())
    }

    async fn content_exists(&self, entry: &AssetEntry) -> Result<bool> {
        let path = self.local_path(entry);
        if !path.exists() {
            return Ok(false);
        }
        Ok(FileManager::hash_file(&path).await? == entry.file_hash)
    }

    async fn local_file_exists(&self, entry: &AssetEntry) -> bool {
        self.local_path(entry).is_file()
    }

    async fn replace_from_local(&self, entry: &mut AssetEntry) -> Result<()> {
        let bytes = fs::read(self.local_path(entry)).await?;
        entry.file_hash = FileManager::hash_bytes(&bytes);
        debug!("Re-ingested {} as {}", entry.filename, entry.file_hash);
        Ok(())
    }

    async fn regenerate_derived(&self, entry: &mut AssetEntry) -> Result<()> {
        for variant in entry.variants.drain(..) {
            match fs::remove_file(self.root.join(&variant)).await {
                Ok(()) => debug!("Removed stale variant {}", variant),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let source = self.local_path(entry);
        if !FileManager::is_image(&source) {
            return Ok(());
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hash_dir = entry.file_hash.get(..10).unwrap_or(&entry.file_hash);
        let variant = format!("{}/{}/{}-thumb.png", RESAMPLED_FOLDER, hash_dir, stem);

        if Self::create_thumbnail(source, self.root.join(&variant)).await? {
            entry.variants.push(variant);
        }
        Ok(())
    }

    async fn write(&self, entry: &AssetEntry) -> Result<()> {
        let mut manifest = self.manifest.write().await;
        manifest.entries.insert(entry.filename.clone(), entry.clone());
        self.save(&manifest).await
    }

    fn is_published(&self, entry: &AssetEntry) -> bool {
        entry.published
    }

    async fn publish_recursive(&self, entry: &mut AssetEntry) -> Result<()> {
        entry.published = true;
        entry.published_hash = Some(entry.file_hash.clone());
        self.write(entry).await
    }
}
