//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path tra provider e asset store:
//! path relativo alla root e filename canonico dello store.

use std::path::{Component, Path};
use tracing::debug;

/// Length of the content-hash folder in hashed asset paths
const HASH_FOLDER_LEN: usize = 10;

/// Prefix of the protected (draft) asset tree
const PROTECTED_FOLDER: &str = ".protected";

/// Utility per calcolare i path in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Path reported by the provider, relative to the root folder
    pub fn provider_relative(original: &Path, root: &Path) -> String {
        match original.strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => {
                debug!("{} is outside {}, using it as is", original.display(), root.display());
                original.to_string_lossy().trim_start_matches('/').to_string()
            }
        }
    }

    /// Store filename for a relative path, dropping the protected prefix and
    /// a content-hash folder right before the file name
    pub fn canonical_filename(relative: &str) -> String {
        let mut segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();

        if segments.first() == Some(&PROTECTED_FOLDER) {
            segments.remove(0);
        }

        if segments.len() >= 2 && Self::is_hash_folder(segments[segments.len() - 2]) {
            segments.remove(segments.len() - 2);
        }

        segments.join("/")
    }

    fn is_hash_folder(segment: &str) -> bool {
        segment.len() == HASH_FOLDER_LEN && segment.bytes().all(|b| b.is_ascii_hexdigit())
    }
}
