//! Persisted key index.
//!
//! The index is a single JSON array of order identifiers. It records which
//! orders were cached so they can be looked up again after a restart; values
//! are never written to disk.
//!
//! Writes are single-writer: the key snapshot is taken while holding the
//! writer mutex, written to a sibling temp file and renamed into place. A
//! later snapshot can never be overwritten by an earlier one, and readers
//! never observe a partially written file.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use orderline_core::CacheError;
use tokio::sync::Mutex;

/// File name of the index inside the cache directory.
pub const KEY_INDEX_FILE: &str = "cache_keys.json";

/// The on-disk set of cached order identifiers.
#[derive(Debug)]
pub struct KeyIndex {
    path: PathBuf,
    writer: Mutex<()>,
}

impl KeyIndex {
    /// Index stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Index stored as [`KEY_INDEX_FILE`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(KEY_INDEX_FILE))
    }

    /// Location of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted keys, deduplicated and sorted.
    ///
    /// A missing file is a first run and yields no keys.
    pub async fn load(&self) -> Result<Vec<String>, CacheError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::IndexRead {
                    path: self.display_path(),
                    reason: e.to_string(),
                })
            }
        };

        let keys: Vec<String> =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::IndexDecode {
                path: self.display_path(),
                reason: e.to_string(),
            })?;

        Ok(keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect())
    }

    /// Persist the key set produced by `snapshot`.
    ///
    /// `snapshot` runs while the writer mutex is held, so the file always
    /// reflects a key set at least as recent as any earlier write.
    pub async fn persist_with<F>(&self, snapshot: F) -> Result<usize, CacheError>
    where
        F: FnOnce() -> Vec<String>,
    {
        let _writer = self.writer.lock().await;

        let keys: BTreeSet<String> = snapshot().into_iter().collect();
        let data = serde_json::to_vec(&keys).map_err(|e| self.write_error(e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        Ok(keys.len())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| KEY_INDEX_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn write_error(&self, e: impl std::fmt::Display) -> CacheError {
        CacheError::IndexWrite {
            path: self.display_path(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() -> Result<(), CacheError> {
        let dir = tempfile::tempdir().unwrap();
        let index = KeyIndex::in_dir(dir.path());
        assert!(index.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_persist_then_load_dedups_and_sorts() -> Result<(), CacheError> {
        let dir = tempfile::tempdir().unwrap();
        let index = KeyIndex::in_dir(dir.path());

        let written = index
            .persist_with(|| vec!["B2000".into(), "A1000".into(), "B2000".into()])
            .await?;
        assert_eq!(written, 2);
        assert_eq!(index.load().await?, vec!["A1000".to_string(), "B2000".to_string()]);

        let raw = std::fs::read_to_string(index.path()).unwrap();
        assert_eq!(raw, r#"["A1000","B2000"]"#);
        assert!(!index.temp_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_tolerates_duplicates_on_disk() -> Result<(), CacheError> {
        let dir = tempfile::tempdir().unwrap();
        let index = KeyIndex::in_dir(dir.path());
        std::fs::write(index.path(), r#"["A1000","A1000","C3000"]"#).unwrap();

        assert_eq!(index.load().await?, vec!["A1000".to_string(), "C3000".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = KeyIndex::in_dir(dir.path());
        std::fs::write(index.path(), b"{\"not\": \"an array\"}").unwrap();

        let err = index.load().await.unwrap_err();
        assert!(matches!(err, CacheError::IndexDecode { .. }));
    }

    #[tokio::test]
    async fn test_persist_creates_missing_directory() -> Result<(), CacheError> {
        let dir = tempfile::tempdir().unwrap();
        let index = KeyIndex::in_dir(dir.path().join("nested").join("cache"));
        index.persist_with(|| vec!["A1000".into()]).await?;
        assert_eq!(index.load().await?, vec!["A1000".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_location_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let index = KeyIndex::in_dir(&blocker);
        let err = index.persist_with(|| vec!["A1000".into()]).await.unwrap_err();
        assert!(matches!(err, CacheError::IndexWrite { .. }));
    }
}
