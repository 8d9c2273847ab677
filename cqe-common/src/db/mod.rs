//! Database module
//!
//! Schema creation, immutability triggers, and shared row models for the
//! content quality engine. The database is the single source of truth;
//! write-once and partial-immutability rules are enforced here, at the
//! storage layer, not in calling code.

pub mod init;
pub mod models;

pub use init::init_database;
