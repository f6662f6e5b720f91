//! Collaborator traits for the redirect core
//!
//! This module defines the abstract interfaces the core is written against.
//!
//! - [`ZoneClient`]: Apply record changes at the DNS provider
//! - [`DomainStore`] / [`UserStore`]: Narrow data store contracts
//! - [`Mailer`]: Lifecycle and dormancy notifications
//! - [`DomainRemover`]: Account-wide domain teardown
//! - [`CursorStore`]: Persisted reconciler progress

pub mod cursor_store;
pub mod mailer;
pub mod remover;
pub mod store;
pub mod zone_client;

pub use cursor_store::CursorStore;
pub use mailer::Mailer;
pub use remover::DomainRemover;
pub use store::{DomainStore, UserStore};
pub use zone_client::ZoneClient;
