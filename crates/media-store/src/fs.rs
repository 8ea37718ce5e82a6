//! Filesystem-backed media store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   Pictures/<album>/2026_03_01_12_00_00_000.jpg
//!   Pictures/<album>/2026_03_01_12_00_00_000.jpg.meta.json
//!   DCIM/<album>/2026_03_01_12_05_10_250.mp4
//!   DCIM/<album>/2026_03_01_12_05_10_250.mp4.meta.json
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::record::{MediaRecord, SIDECAR_SUFFIX};
use crate::{DestinationHandle, MediaKind, MediaReference, MediaStore, StoreError};

/// Timestamp format used for item names.
const NAME_FORMAT: &str = "%Y_%m_%d_%H_%M_%S_%3f";

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Media store writing items and their sidecar records to a directory tree.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
    album: String,
}

impl FsMediaStore {
    /// Create a store rooted at `root`, filing items under `album`.
    pub fn new(root: impl Into<PathBuf>, album: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            album: album.into(),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding items of `kind`, relative to the root.
    pub fn relative_dir(&self, kind: MediaKind) -> String {
        format!("{}/{}", kind.collection_dir(), self.album)
    }

    /// All records in the store, oldest first.
    pub fn list(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let mut records = vec![];
        for kind in [MediaKind::Photo, MediaKind::Video] {
            let dir = self.root.join(self.relative_dir(kind));
            if !dir.exists() {
                continue;
            }
            let entries = std::fs::read_dir(&dir).map_err(|e| StoreError::Io {
                path: dir.clone(),
                source: e,
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
                let path = entry.path();
                let is_sidecar = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(SIDECAR_SUFFIX));
                if is_sidecar {
                    records.push(MediaRecord::load_sidecar(&path)?);
                }
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    fn allocate(&self, kind: MediaKind, mime_type: &str) -> Result<DestinationHandle, StoreError> {
        let relative_path = self.relative_dir(kind);
        let dir = self.root.join(&relative_path);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let now = chrono::Local::now();
        let stem = now.format(NAME_FORMAT).to_string();
        let extension = extension_for_mime(mime_type);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let display_name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}_{attempt}")
            };
            let file_name = format!("{display_name}.{extension}");
            let path = dir.join(&file_name);

            // create_new claims the name atomically against concurrent captures.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    let record = MediaRecord {
                        display_name: display_name.clone(),
                        mime_type: mime_type.to_string(),
                        kind,
                        relative_path: relative_path.clone(),
                        file_name,
                        is_pending: true,
                        created_at: now.to_rfc3339(),
                        attributes: BTreeMap::new(),
                    };
                    record.save(&path)?;
                    return Ok(DestinationHandle::new(display_name, kind, mime_type, path));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::Io { path, source: e }),
            }
        }

        Err(StoreError::Io {
            path: dir,
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "no free media name available",
            ),
        })
    }

    fn update_record(
        &self,
        handle: &DestinationHandle,
        update: impl FnOnce(&mut MediaRecord),
    ) -> Result<(), StoreError> {
        if !handle.path().exists() {
            return Err(StoreError::Missing {
                path: handle.path().to_path_buf(),
            });
        }
        let mut record = MediaRecord::load(handle.path())?;
        update(&mut record);
        record.save(handle.path())
    }
}

impl MediaStore for FsMediaStore {
    fn create_destination(&self, kind: MediaKind, mime_type: &str) -> Option<DestinationHandle> {
        match self.allocate(kind, mime_type) {
            Ok(handle) => {
                tracing::debug!(
                    name = handle.display_name(),
                    ?kind,
                    mime_type,
                    "Created pending media item"
                );
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, ?kind, "Failed to create media item");
                None
            }
        }
    }

    fn write_bytes(
        &self,
        handle: &DestinationHandle,
        bytes: &[u8],
    ) -> Result<MediaReference, StoreError> {
        std::fs::write(handle.path(), bytes).map_err(|e| StoreError::Io {
            path: handle.path().to_path_buf(),
            source: e,
        })?;
        tracing::debug!(name = handle.display_name(), bytes = bytes.len(), "Wrote media bytes");
        Ok(handle.reference())
    }

    fn write_metadata(
        &self,
        handle: &DestinationHandle,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.update_record(handle, |record| {
            record
                .attributes
                .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
    }

    fn finalize(&self, handle: &DestinationHandle) -> Result<(), StoreError> {
        self.update_record(handle, |record| record.is_pending = false)?;
        tracing::info!(name = handle.display_name(), "Media item finalized");
        Ok(())
    }

    fn discard(&self, handle: &DestinationHandle) -> Result<(), StoreError> {
        for path in [
            handle.path().to_path_buf(),
            MediaRecord::sidecar_path(handle.path()),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io { path, source: e }),
            }
        }
        tracing::debug!(name = handle.display_name(), "Discarded media item");
        Ok(())
    }
}

/// File extension for a MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "video/mp4" => "mp4",
        "video/mpeg" => "mpg",
        "video/webm" => "webm",
        _ => "bin",
    }
}
