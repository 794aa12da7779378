//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file condivise dagli altri moduli.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva degli audit log (`.shortpixel`) sotto la root
//! - Calcolo del prefisso di cartella relativo alla root
//! - Hash SHA-256 del contenuto su disco (indirizzamento dell'asset store)
//! - Determinazione formato immagine per la rigenerazione dei thumbnails
//! - Formattazione human-readable delle dimensioni
//!
//! ## Operazioni sui file:
//! - `find_audit_logs()`: Trova tutti gli audit log in una directory
//! - `folder_prefix()`: Cartella contenitore relativa alla root, con `/` finale
//! - `hash_file()`: Hash hex del contenuto di un file
//! - `is_image()`: Determina se un file è un'immagine
//! - `find_images()`: Immagini sotto la root, per la registrazione nello store
//! - `write_atomic()`: Scrittura atomica di state file e manifest
//!
//! ## Esempio:
//! ```rust,ignore
//! for log in FileManager::find_audit_logs(&root) {
//!     let prefix = FileManager::folder_prefix(&log, &root);
//! }
//! ```

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Suffix of the provider's per-folder audit log
pub const AUDIT_LOG_SUFFIX: &str = ".shortpixel";

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find every audit log below `root`. Unreadable directories are skipped.
    pub fn find_audit_logs(root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && Self::is_audit_log(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Check if a file name ends with the audit log suffix (case-insensitive)
    pub fn is_audit_log(path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase().ends_with(AUDIT_LOG_SUFFIX))
            .unwrap_or(false)
    }

    /// Containing folder of `file` relative to `root`, `/`-separated with a
    /// trailing `/`, or empty for files directly in `root`
    pub fn folder_prefix(file: &Path, root: &Path) -> String {
        let parent = file.parent().unwrap_or(Path::new(""));
        let relative = parent.strip_prefix(root).unwrap_or(parent);

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            String::new()
        } else {
            format!("{}/", segments.join("/"))
        }
    }

    /// SHA-256 of a file's bytes, hex encoded
    pub async fn hash_file(path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        Ok(Self::hash_bytes(&bytes))
    }

    /// SHA-256 of a byte slice, hex encoded
    pub fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Replace `path` with `contents`; readers see either the old or the new file
    pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;

            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&contents)?;
            file.as_file().sync_all()?;
            file.persist(&path)?;
            Ok(())
        })
        .await?
    }

    /// Images below `root`, skipping directories named in `skip_dirs`
    pub fn find_images(root: &Path, skip_dirs: &[&str]) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !skip_dirs.iter().any(|dir| entry.file_name() == *dir)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && Self::is_image(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif")
        } else {
            false
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
