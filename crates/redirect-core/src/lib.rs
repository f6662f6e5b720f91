// # redirect-core
//
// Core library for the redirect dynamic DNS service.
//
// ## Architecture Overview
//
// This library keeps hosted zones in sync with device-reported addresses and
// walks the domain and user populations applying lifecycle rules:
// - **Change detector**: decides whether a device update needs a DNS push
// - **DnsSynchronizer**: publishes or parks a domain's record sets
// - **CursorStore**: single-scalar progress marker for the reconcilers
// - **DormancyReconciler**: parks DNS of domains that stopped reporting
// - **LifecycleReconciler**: trial, lock warning and lock for free accounts
//
// ## Design Principles
//
// 1. **Collaborators are traits**: data store, DNS provider, mailer and
//    cursor persistence are injected as `Arc<dyn Trait>`
// 2. **Stateless synchronization**: the desired record set is recomputed on
//    every push, never read back from the provider
// 3. **Retry on the next tick**: a failed tick is logged and repeated from
//    the persisted cursor, there is no in-tick retry
// 4. **Single writer**: one process runs the reconcilers per data store

pub mod change;
pub mod config;
pub mod cursor;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod service;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    CursorStoreConfig, DnsConfig, DormancyConfig, LifecycleConfig, MailConfig, RedirectConfig,
    ServiceConfig,
};
pub use cursor::{FileCursorStore, MemoryCursorStore};
pub use dns::DnsSynchronizer;
pub use error::{Error, Result};
pub use model::{Domain, DomainUpdate, User};
pub use reconcile::{
    DormancyReconciler, LifecycleReconciler, Reconciler, ReconcilerHandle, ReconcilerTask,
};
pub use service::{Certbot, Domains};
pub use traits::{CursorStore, DomainRemover, DomainStore, Mailer, UserStore, ZoneClient};
