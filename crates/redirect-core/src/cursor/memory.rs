// # Memory Cursor Store
//
// In-memory implementation of CursorStore.
//
// ## Crash Behavior
//
// - The cursor is lost on restart
// - The lifecycle scan restarts from the first user
// - The dormancy loop is unaffected (its selection never reads the cursor)

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::CursorStore;

/// In-memory cursor store
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore<T> {
    inner: Arc<RwLock<T>>,
}

impl<T: Default> MemoryCursorStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(T::default())),
        }
    }

    /// Start from a known value instead of zero
    pub fn with_value(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }
}

#[async_trait]
impl<T> CursorStore<T> for MemoryCursorStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<T, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn set(&self, value: T) -> Result<(), Error> {
        *self.inner.write().await = value;
        Ok(())
    }
}
