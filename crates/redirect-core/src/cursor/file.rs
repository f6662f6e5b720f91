// # File Cursor Store
//
// File-based implementation of CursorStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of the previous cursor
// - Recovery: Falls back to backup, then to the zero value
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "value": 42
// }
// ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::CursorStore;

/// Cursor file format version
const CURSOR_FILE_VERSION: &str = "1.0";

/// File-based cursor store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use redirect_core::cursor::FileCursorStore;
/// use redirect_core::traits::CursorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store: FileCursorStore<i64> =
///         FileCursorStore::new("/var/lib/redirect/user-lifecycle.json").await?;
///
///     store.set(42).await?;
///     assert_eq!(store.get().await?, 42);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileCursorStore<T> {
    path: PathBuf,
    value: Arc<RwLock<T>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFileFormat<T> {
    version: String,
    value: T,
}

impl<T> FileCursorStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    /// Create or load a file cursor store
    ///
    /// A missing file starts at the zero value. Parent directories are
    /// created as needed.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create cursor directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let value = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            value: Arc::new(RwLock::new(value)),
        })
    }

    /// Load the cursor, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<T, Error> {
        let err = match Self::load(path).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !matches!(err, Error::Json(_)) {
            return Err(err);
        }

        tracing::warn!(
            path = %path.display(),
            "Cursor file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No cursor backup found. Starting from zero.");
            return Ok(T::default());
        }

        match Self::load(&backup_path).await {
            Ok(value) => {
                tracing::info!(path = %path.display(), "Recovered cursor from backup");
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore cursor file from backup: {}", restore_err);
                }
                Ok(value)
            }
            Err(backup_err) => {
                tracing::error!("Cursor backup also corrupted: {}. Starting from zero.", backup_err);
                Ok(T::default())
            }
        }
    }

    async fn load(path: &Path) -> Result<T, Error> {
        if !path.exists() {
            tracing::debug!("Cursor file does not exist: {}", path.display());
            return Ok(T::default());
        }

        let content = fs::read_to_string(path).await?;
        let file: CursorFileFormat<T> = serde_json::from_str(&content)?;

        if file.version != CURSOR_FILE_VERSION {
            tracing::warn!(
                "Cursor file version mismatch: expected {}, got {}. Loading anyway.",
                CURSOR_FILE_VERSION,
                file.version
            );
        }

        Ok(file.value)
    }

    /// Write the cursor atomically
    async fn write(&self, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(&CursorFileFormat {
            version: CURSOR_FILE_VERSION.to_string(),
            value,
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cursor(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cursor(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::cursor(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create cursor backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cursor(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Cursor written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl<T> CursorStore<T> for FileCursorStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<T, Error> {
        Ok(self.value.read().await.clone())
    }

    async fn set(&self, value: T) -> Result<(), Error> {
        let mut guard = self.value.write().await;
        self.write(&value).await?;
        *guard = value;
        Ok(())
    }
}
