// # Cursor Store Trait
//
// Defines the interface for a reconciler's persisted progress marker.
//
// ## Purpose
//
// A reconciler walks an unbounded, changing population one entity per tick.
// The cursor is the single scalar that lets it resume after a restart without
// skipping or reprocessing entities:
// - the last processed user id for the lifecycle reconciler
// - the last swept window boundary for the dormancy reconciler
//
// ## Implementations
//
// - File-based: JSON file with atomic replace and backup recovery
// - Memory: non-persistent, for tests and throwaway deployments

use async_trait::async_trait;

/// Trait for cursor store implementations
///
/// A cursor that was never written reads as `T::default()` (zero).
///
/// # Ownership
///
/// Every cursor is owned by exactly one reconciler. Two processes sharing a
/// cursor is an unsupported deployment.
#[async_trait]
pub trait CursorStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Read the cursor
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: The last written value, or the zero value if never written
    /// - `Err(Error)`: Storage error
    async fn get(&self) -> Result<T, crate::Error>;

    /// Durably replace the cursor
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The value survives a restart
    /// - `Err(Error)`: Storage error
    async fn set(&self, value: T) -> Result<(), crate::Error>;
}
