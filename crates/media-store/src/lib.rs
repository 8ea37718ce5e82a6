//! Dashcam Media Store
//!
//! Defines the persistence contract the capture engine hands finished media
//! to, and a filesystem implementation of it:
//! - **Destinations:** pending media items created before any bytes exist
//! - **Records:** per-item metadata (MIME type, pending flag, attributes)
//! - **References:** durable handles to finalized items
//!
//! A destination stays pending until [`MediaStore::finalize`] is called, so
//! readers never observe half-written photos or recordings as complete.

pub mod fs;
pub mod record;

pub use fs::*;
pub use record::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of media a destination holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Top-level collection directory for this kind.
    pub fn collection_dir(self) -> &'static str {
        match self {
            Self::Photo => "Pictures",
            Self::Video => "DCIM",
        }
    }
}

/// A not-yet-finalized media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHandle {
    display_name: String,
    kind: MediaKind,
    mime_type: String,
    path: PathBuf,
}

impl DestinationHandle {
    pub fn new(
        display_name: impl Into<String>,
        kind: MediaKind,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            mime_type: mime_type.into(),
            path: path.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Location the item's bytes are written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durable reference to this item.
    pub fn reference(&self) -> MediaReference {
        MediaReference {
            display_name: self.display_name.clone(),
            kind: self.kind,
            path: self.path.clone(),
        }
    }
}

/// A durable reference to stored media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub display_name: String,
    pub kind: MediaKind,
    pub path: PathBuf,
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Persistence collaborator for captured media.
pub trait MediaStore: Send + Sync {
    /// Create a new pending item. Returns `None` if the store cannot
    /// allocate one.
    fn create_destination(&self, kind: MediaKind, mime_type: &str) -> Option<DestinationHandle>;

    /// Write the complete contents of an item.
    fn write_bytes(
        &self,
        handle: &DestinationHandle,
        bytes: &[u8],
    ) -> Result<MediaReference, StoreError>;

    /// Attach key/value attributes (e.g. the orientation tag) to an item.
    fn write_metadata(
        &self,
        handle: &DestinationHandle,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Mark a pending item as complete.
    fn finalize(&self, handle: &DestinationHandle) -> Result<(), StoreError>;

    /// Remove an item that will never be finalized.
    fn discard(&self, handle: &DestinationHandle) -> Result<(), StoreError>;
}

/// Errors that can occur when persisting media.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Media item missing: {path}")]
    Missing { path: PathBuf },
}
