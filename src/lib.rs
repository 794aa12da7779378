//! # Folder Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom (run e provider)
//! - `state`: RunState persistito e record di site config
//! - `status_record`: Parser dei record a larghezza fissa degli audit log
//! - `audit_log`: Lettura ricorsiva degli audit log del provider
//! - `report`: Report ordinato per data di modifica
//! - `provider`: Client del provider esterno di ottimizzazione
//! - `asset_store`: Store dei file gestiti (manifest + derivati)
//! - `file_manager`: Operazioni sui file e discovery degli audit log
//! - `optimizer`: Orchestratore del run e repair
//! - `progress`: Progress tracking e statistiche
//! - `json_output`: Output JSON per l'uso programmatico
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use folder_optimizer::{Config, FolderTask};
//!
//! let task = FolderTask::new(config, provider, state, repairer);
//! let summary = task.run().await?;
//! ```

pub mod asset_store;
pub mod audit_log;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod provider;
pub mod report;
pub mod state;
pub mod status_record;

pub use asset_store::{AssetStore, FsAssetStore};
pub use audit_log::AuditLogReader;
pub use config::Config;
pub use error::{OptimizeError, ProviderError};
pub use optimizer::{AssetStoreRepairer, FolderTask};
pub use progress::RunSummary;
pub use provider::{ApiStatus, CommandProvider, OptimizationProvider};
pub use report::{ReportAggregator, ReportRow};
pub use state::{MemoryStateStore, RunState, RunStateStore, SiteConfigStore};
pub use status_record::StatusRecord;
