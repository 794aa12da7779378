//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del folder task.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del run
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Risolve la root folder, la state dir e il manifest dell'asset store
//! - Legge la API key del provider dall'ambiente
//!
//! ## Parametri di configurazione:
//! - `root_folder`: Cartella da ottimizzare (default: `./assets`)
//! - `max_files_per_call`: File massimi per chiamata al provider (default: 10)
//! - `client_max_body_size`: Limite body della richiesta in MB (default: 48)
//! - `wait_seconds`: Timeout di attesa del provider (default: 500)
//! - `exclude_folders`: Cartelle escluse dall'ottimizzazione
//! - `use_simple_image_recovering`: Abilita recovery e repair (default: true)
//! - `repair_cooldown_seconds`: Pausa prima della fase di repair (default: 4)
//! - `provider_command`: Programma esterno del provider
//! - `provider_options`: Opzioni inoltrate al provider (`persist_type=text`)
//! - `api_key_env`: Variabile d'ambiente con la API key (default: `SP_APIKEY`)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     max_files_per_call: 25,
//!     exclude_folders: vec!["_resampled".into()],
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::OptimizeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fallback asset root when no `root_folder` is configured
pub const DEFAULT_ROOT_FOLDER: &str = "assets";

/// Configuration for the folder optimization task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder to optimize (None = `./assets`)
    pub root_folder: Option<PathBuf>,
    /// Files submitted to the provider per run
    pub max_files_per_call: usize,
    /// Request body ceiling in MB
    pub client_max_body_size: u32,
    /// How long to wait for the provider, in seconds
    pub wait_seconds: u64,
    /// Folder names the provider must skip
    pub exclude_folders: Vec<String>,
    /// Run recovery of the previous batch and repair of the current one
    pub use_simple_image_recovering: bool,
    /// Pause before repairing, so provider writes can settle
    pub repair_cooldown_seconds: u64,
    /// External provider program
    pub provider_command: String,
    /// Arguments placed before the batch arguments (e.g. a wrapper script)
    pub provider_args: Vec<String>,
    /// Extra provider options, passed as `--option key=value`
    pub provider_options: BTreeMap<String, String>,
    /// Environment variable holding the provider credential
    pub api_key_env: String,
    /// Directory for the site config record (None = `~/.folder-optimizer`)
    pub state_dir: Option<PathBuf>,
    /// Asset store manifest (None = `<root>/.assetstore.json`)
    pub asset_manifest: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut provider_options = BTreeMap::new();
        provider_options.insert("persist_type".to_string(), "text".to_string());

        Self {
            root_folder: None,
            max_files_per_call: 10,
            client_max_body_size: 48,
            wait_seconds: 500,
            exclude_folders: Vec::new(),
            use_simple_image_recovering: true,
            repair_cooldown_seconds: 4,
            provider_command: "shortpixel-cli".to_string(),
            provider_args: Vec::new(),
            provider_options,
            api_key_env: "SP_APIKEY".to_string(),
            state_dir: None,
            asset_manifest: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_files_per_call == 0 {
            return Err(anyhow::anyhow!("max_files_per_call must be greater than 0"));
        }

        if self.client_max_body_size == 0 {
            return Err(anyhow::anyhow!("client_max_body_size must be greater than 0"));
        }

        if self.provider_command.trim().is_empty() {
            return Err(anyhow::anyhow!("provider_command must not be empty"));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(anyhow::anyhow!("api_key_env must not be empty"));
        }

        if let Some(ref root) = self.root_folder {
            if root.exists() && !root.is_dir() {
                return Err(anyhow::anyhow!("Root folder is not a directory: {}", root.display()));
            }
        }

        Ok(())
    }

    /// The unique folder every run works on
    pub fn root_folder(&self) -> PathBuf {
        self.root_folder
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_FOLDER))
    }

    /// Directory holding the persisted site config record
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.state_dir {
            return Ok(dir.clone());
        }

        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".folder-optimizer"))
    }

    /// Location of the asset store manifest
    pub fn asset_manifest(&self) -> PathBuf {
        self.asset_manifest
            .clone()
            .unwrap_or_else(|| self.root_folder().join(".assetstore.json"))
    }

    /// Provider credential, required before any side effect
    pub fn api_key(&self) -> Result<String, OptimizeError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(OptimizeError::MissingCredential(self.api_key_env.clone())),
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
