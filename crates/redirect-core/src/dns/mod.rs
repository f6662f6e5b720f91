//! DNS projection and synchronization
//!
//! - [`records`]: record sets, change batches and the per-domain projection
//! - [`DnsSynchronizer`]: applies projections to a hosted zone

pub mod records;
pub mod synchronizer;

pub use records::{Change, ChangeAction, ChangeBatch, DomainProjection, RecordSet, RecordType};
pub use synchronizer::DnsSynchronizer;
