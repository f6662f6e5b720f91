//! Domain and user records as loaded from the data store
//!
//! Records are plain owned values: a reconciler loads one, computes the next
//! value and hands it back to the store.

pub mod domain;
pub mod user;

pub use domain::{Domain, DomainUpdate};
pub use user::User;
