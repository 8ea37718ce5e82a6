//! Sidecar metadata records for stored media.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MediaKind, StoreError};

/// Suffix appended to a media file name to form its sidecar path.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Metadata kept next to every stored media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Display name (file stem).
    pub display_name: String,

    /// MIME type of the item.
    pub mime_type: String,

    /// Kind of media.
    pub kind: MediaKind,

    /// Directory of the item relative to the store root.
    pub relative_path: String,

    /// File name of the item inside `relative_path`.
    pub file_name: String,

    /// Pending items have been created but not finalized.
    pub is_pending: bool,

    /// Creation time (RFC 3339).
    pub created_at: String,

    /// Free-form attributes such as the orientation tag.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl MediaRecord {
    /// Sidecar path for a media file.
    pub fn sidecar_path(media_path: &Path) -> PathBuf {
        let mut name = media_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(SIDECAR_SUFFIX);
        media_path.with_file_name(name)
    }

    /// Load the record stored next to `media_path`.
    pub fn load(media_path: &Path) -> Result<Self, StoreError> {
        let path = Self::sidecar_path(media_path);
        Self::load_sidecar(&path)
    }

    /// Load a record from an explicit sidecar path.
    pub fn load_sidecar(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&json).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the record next to `media_path`.
    pub fn save(&self, media_path: &Path) -> Result<(), StoreError> {
        let path = Self::sidecar_path(media_path);
        let json = serde_json::to_string_pretty(self).map_err(|e| StoreError::Parse {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| StoreError::Io { path, source: e })
    }
}
