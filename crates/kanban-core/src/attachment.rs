use crate::error::{KanbanError, Result};
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Metadata row for a file attached to a task. The bytes live in a [`BlobStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub blob_key: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(
        task_id: Uuid,
        filename: &str,
        content_type: impl Into<String>,
        size: u64,
        uploaded_by: Uuid,
    ) -> Result<Self> {
        let filename = sanitize_filename(filename)?;
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            task_id,
            blob_key: format!("{task_id}/{id}"),
            filename,
            content_type: content_type.into(),
            size,
            uploaded_by,
            created_at: Utc::now(),
        })
    }
}

/// Keep only the final path component and reject names that are empty after trimming.
pub fn sanitize_filename(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(KanbanError::InvalidInput(format!(
            "'{name}' is not a usable file name"
        )));
    }
    Ok(base.chars().filter(|c| !c.is_control()).collect())
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Object storage for attachment bytes, addressed by key.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Stores each blob as a file under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        io::ensure_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/');
        if !valid {
            return Err(KanbanError::InvalidInput(format!("invalid blob key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        io::atomic_write(&self.path_for(key)?, data)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KanbanError::AttachmentNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn blob_round_trip_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs")).unwrap();
        let meta =
            Attachment::new(Uuid::new_v4(), "notes.txt", "text/plain", 5, Uuid::new_v4()).unwrap();

        store.put(&meta.blob_key, b"hello").unwrap();
        assert_eq!(store.get(&meta.blob_key).unwrap(), b"hello");

        store.delete(&meta.blob_key).unwrap();
        assert!(matches!(
            store.get(&meta.blob_key),
            Err(KanbanError::AttachmentNotFound(_))
        ));
        // Deleting twice is fine.
        store.delete(&meta.blob_key).unwrap();
    }

    #[test]
    fn blob_keys_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        for key in ["../etc/passwd", "a/../../b", "", "/abs", "a b"] {
            assert!(store.put(key, b"x").is_err(), "{key}");
        }
    }

    #[test]
    fn filename_is_reduced_to_basename() {
        assert_eq!(sanitize_filename("../../secret.txt").unwrap(), "secret.txt");
        assert_eq!(sanitize_filename(r"C:\Users\me\pic.png").unwrap(), "pic.png");
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
    }
}
