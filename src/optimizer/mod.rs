//! # Optimizer Module
//!
//! Separa le responsabilità del run in sottomoduli:
//! - `folder_task`: Orchestratore del run (recovery, provider, persist, repair)
//! - `repairer`: Riparazione di una singola entry dell'asset store
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod folder_task;
pub mod path_resolver;
pub mod repairer;

pub use folder_task::FolderTask;
pub use path_resolver::PathResolver;
pub use repairer::{AssetRepair, AssetStoreRepairer, RepairOutcome};
