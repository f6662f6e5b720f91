//! Periodic reconciliation loops
//!
//! Each reconciler processes at most one entity per tick. A
//! [`ReconcilerTask`] owns the schedule:
//!
//! ```text
//!   ┌──────────┐   tick(now)   ┌──────────────┐
//!   │   task   │──────────────▶│  Reconciler  │
//!   └──────────┘               └──────────────┘
//!        │ sleep(interval) after the tick completes
//!        ▼
//!   stop() observed only between ticks
//! ```
//!
//! A failed tick is logged and the loop keeps going; the next tick retries
//! from the persisted cursor.
//!
//! Exactly one process may run the reconcilers against a data store.

pub mod dormancy;
pub mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::Result;

pub use dormancy::{DormancyOutcome, DormancyReconciler};
pub use lifecycle::{LifecycleOutcome, LifecycleReconciler};

/// One periodic reconciliation step
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Called once before the first tick
    async fn on_start(&self) {}

    /// Process at most one entity, persisting the cursor before returning
    async fn tick(&self, now: DateTime<Utc>) -> Result<()>;
}

/// Runs a [`Reconciler`] on a fixed interval in its own task
pub struct ReconcilerTask {
    reconciler: Arc<dyn Reconciler>,
    interval: Duration,
}

impl ReconcilerTask {
    pub fn new(reconciler: Arc<dyn Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Spawn the loop onto the current runtime
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let name = self.reconciler.name();
        let join = tokio::spawn(self.run(shutdown_rx));
        ReconcilerHandle {
            name,
            shutdown: Some(shutdown_tx),
            join,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let name = self.reconciler.name();
        info!(reconciler = name, interval = ?self.interval, "Reconciler started");
        self.reconciler.on_start().await;

        loop {
            if let Err(e) = self.reconciler.tick(Utc::now()).await {
                error!(reconciler = name, "Tick failed: {}", e);
            }

            // Dropping the handle also stops the loop
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown_rx => {
                    info!(reconciler = name, "Reconciler stopped");
                    break;
                }
            }
        }
    }
}

/// Handle to a running [`ReconcilerTask`]
pub struct ReconcilerHandle {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the loop and wait for an in-flight tick to finish
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            error!(reconciler = self.name, "Reconciler task ended abnormally: {}", e);
        }
    }
}
