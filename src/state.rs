//! # State Management Module
//!
//! Questo modulo gestisce lo stato persistito tra un run e il successivo.
//!
//! ## Responsabilità:
//! - Definisce `FileDescriptor`, un file manipolato dal provider in un run
//! - Codifica/decodifica il `RunState` (array JSON serializzato come stringa)
//! - Astrae la persistenza dietro il trait `RunStateStore` (get/set/clear)
//! - Persiste il record di site config (flag di disabilitazione + RunState)
//!
//! ## Strutture dati:
//! - `FileDescriptor`: Path originale + metadati restituiti dal provider
//! - `RunState`: Lista dei descriptor dell'ultimo run
//! - `SiteConfigRecord`: Record globale della deployment
//! - `SiteConfigStore`: Store su file JSON
//! - `MemoryStateStore`: Store in memoria (test, embedding)
//!
//! ## Strategia di persistence:
//! - Un file JSON per root folder (basato su hash del path)
//! - Salvataggio in `~/.folder-optimizer/site_config_<hash>.json`
//! - Riletto ad ogni accesso: il flag può cambiare dall'esterno
//! - Scrittura atomica (file temporaneo + rename nella stessa directory)
//! - Un record illeggibile non viene mai sovrascritto con i default
//!
//! ## Concorrenza:
//! Il record non ha versioning. Due run sovrapposti possono perdere dati di
//! recovery: la sovrapposizione va impedita da chi schedula il task.
//!
//! ## Esempio struttura state file:
//! ```json
//! {
//!   "folder_task_disabled": false,
//!   "folder_task_last_images": "[{\"OriginalFile\":\"/srv/assets/a.jpg\"}]"
//! }
//! ```

use crate::file_manager::FileManager;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;

/// One file the provider reported as succeeded or pending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileDescriptor {
    #[serde(alias = "originalFilePath")]
    pub original_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_improvement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_size: Option<u64>,
}

impl FileDescriptor {
    pub fn new(original_file: impl Into<PathBuf>) -> Self {
        Self {
            original_file: original_file.into(),
            saved_file: None,
            status: None,
            percent_improvement: None,
            original_size: None,
            optimized_size: None,
        }
    }
}

/// Descriptors produced by the most recent provider call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub files: Vec<FileDescriptor>,
}

impl RunState {
    pub fn new(files: Vec<FileDescriptor>) -> Self {
        Self { files }
    }

    /// Decode a persisted blob. Absent, empty or unreadable blobs mean
    /// "nothing to recover".
    pub fn decode(blob: Option<&str>) -> Self {
        let blob = match blob.map(str::trim) {
            Some(b) if !b.is_empty() && b != "null" => b,
            _ => return Self::default(),
        };

        match serde_json::from_str(blob) {
            Ok(files) => Self { files },
            Err(e) => {
                warn!("Ignoring unreadable run state: {}", e);
                Self::default()
            }
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.files)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Single-slot persistence for the run state blob
#[async_trait]
pub trait RunStateStore: Send + Sync {
    async fn get(&self) -> Result<Option<String>>;
    async fn set(&self, blob: String) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Run state held in memory
#[derive(Default)]
pub struct MemoryStateStore {
    slot: RwLock<Option<String>>,
}

impl MemoryStateStore {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            slot: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl RunStateStore for MemoryStateStore {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, blob: String) -> Result<()> {
        *self.slot.write().await = Some(blob);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}

/// Global configuration record of one deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfigRecord {
    pub folder_task_disabled: bool,
    pub folder_task_last_images: Option<String>,
}

/// Site config record stored as a JSON file
pub struct SiteConfigStore {
    path: PathBuf,
}

impl SiteConfigStore {
    /// Store for the deployment rooted at `root_folder`. Nothing touches the
    /// disk until the first write.
    pub fn new(state_dir: &Path, root_folder: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(root_folder.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize())[..16].to_string();

        Self {
            path: state_dir.join(format!("site_config_{}.json", hash)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. A record that exists but does not parse is an error,
    /// never the defaults.
    pub async fn load(&self) -> Result<SiteConfigRecord> {
        if !self.path.exists() {
            return Ok(SiteConfigRecord::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        serde_json::from_str(&content).map_err(|e| {
            warn!("Unreadable site config record {}: {}", self.path.display(), e);
            anyhow::anyhow!("Corrupt site config record {}: {}", self.path.display(), e)
        })
    }

    pub async fn save(&self, record: &SiteConfigRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)?;
        FileManager::write_atomic(&self.path, content.into_bytes()).await
    }

    pub async fn is_task_disabled(&self) -> Result<bool> {
        Ok(self.load().await?.folder_task_disabled)
    }

    pub async fn set_task_disabled(&self, disabled: bool) -> Result<()> {
        let mut record = self.load().await?;
        record.folder_task_disabled = disabled;
        self.save(&record).await
    }
}

#[async_trait]
impl RunStateStore for SiteConfigStore {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.load().await?.folder_task_last_images)
    }

    async fn set(&self, blob: String) -> Result<()> {
        let mut record = self.load().await?;
        record.folder_task_last_images = Some(blob);
        self.save(&record).await
    }

    async fn clear(&self) -> Result<()> {
        let mut record = self.load().await?;
        record.folder_task_last_images = None;
        self.save(&record).await
    }
}
