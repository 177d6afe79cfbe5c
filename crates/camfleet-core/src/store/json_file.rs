// ── JSON file store ──
//
// Each logical store is one JSON document, read whole on start and
// rewritten whole on every mutation. Writes go to a sibling temp file and
// are renamed into place, one writer at a time.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CoreError;

pub(crate) struct JsonFile<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned + Default> JsonFile<T> {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing file yields the empty document.
    pub(crate) async fn load(&self) -> Result<T, CoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store file absent, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(self.store_error(e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&raw).map_err(|e| self.store_error(e))
    }

    /// Replace the document on disk.
    pub(crate) async fn save(&self, doc: &T) -> Result<(), CoreError> {
        let body = serde_json::to_vec_pretty(doc).map_err(|e| self.store_error(e))?;
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.store_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| self.store_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.store_error(e))?;

        debug!(path = %self.path.display(), bytes = body.len(), "store written");
        Ok(())
    }

    fn store_error(&self, err: impl std::fmt::Display) -> CoreError {
        CoreError::Store {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    type Doc = BTreeMap<String, u32>;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Doc> = JsonFile::new(dir.path().join("absent.json"));
        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/doc.json");
        let file: JsonFile<Doc> = JsonFile::new(&path);
        file.save(&Doc::from([("a".into(), 1)])).await.unwrap();

        assert_eq!(file.load().await.unwrap().get("a"), Some(&1));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();
        let file: JsonFile<Doc> = JsonFile::new(&path);
        assert!(matches!(file.load().await, Err(CoreError::Store { .. })));
    }
}
