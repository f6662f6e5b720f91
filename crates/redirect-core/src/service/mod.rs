//! Request-driven services built on the core
//!
//! - [`Domains`]: device updates and domain removal
//! - [`Certbot`]: ACME challenge records

pub mod certbot;
pub mod domains;

pub use certbot::Certbot;
pub use domains::Domains;
