// # Cursor Store Implementations
//
// Implementations of the CursorStore trait for different persistence
// strategies.

pub mod file;
pub mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use file::FileCursorStore;
pub use memory::MemoryCursorStore;

use crate::config::CursorStoreConfig;
use crate::traits::CursorStore;

/// Build the cursor store described by `config`
pub async fn from_config<T>(config: &CursorStoreConfig) -> Result<Arc<dyn CursorStore<T>>, crate::Error>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    match config {
        CursorStoreConfig::File { path } => Ok(Arc::new(FileCursorStore::<T>::new(path).await?)),
        CursorStoreConfig::Memory => Ok(Arc::new(MemoryCursorStore::<T>::new())),
    }
}
