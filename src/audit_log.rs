//! # Audit Log Reader Module
//!
//! Legge tutti gli audit log del provider sotto la root folder.
//!
//! ## Responsabilità:
//! - Trova ricorsivamente i file `.shortpixel` (via `FileManager`)
//! - Calcola il prefisso di cartella di ogni log rispetto alla root
//! - Legge ogni log in streaming, riga per riga (i log sono append-only)
//! - Passa ogni riga a `StatusRecord::parse` e tiene solo i record validi
//! - Scarta i directory marker (`type == "D"`)
//!
//! ## Resilienza:
//! - File non leggibili: saltati, la traversata continua
//! - Righe malformate o parziali: scartate in silenzio
//! - Ogni file handle viene chiuso alla fine del suo scope, anche su errore
//!
//! L'ordine dell'output non è garantito: l'ordinamento spetta al report.

use crate::{file_manager::FileManager, status_record::StatusRecord};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Collects records from every audit log below a root folder
pub struct AuditLogReader;

impl AuditLogReader {
    /// Read all valid, non-directory records below `root`
    pub async fn generate(root: &Path) -> Vec<StatusRecord> {
        let mut records = Vec::new();

        for log_path in FileManager::find_audit_logs(root) {
            let prefix = FileManager::folder_prefix(&log_path, root);
            let before = records.len();
            Self::read_log(&log_path, &prefix, &mut records).await;
            debug!(
                "Read {} records from {}",
                records.len() - before,
                log_path.display()
            );
        }

        records
    }

    /// Stream one log into `records`. The file is closed when this returns.
    async fn read_log(path: &Path, prefix: &str, records: &mut Vec<StatusRecord>) {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping unreadable audit log {}: {}", path.display(), e);
                return;
            }
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if let Some(record) = StatusRecord::parse(&line, prefix) {
                        if !record.is_directory() {
                            records.push(record);
                        }
                    }
                }
                Err(e) => {
                    warn!("Stopped reading {} after error: {}", path.display(), e);
                    break;
                }
            }
        }
    }
}
