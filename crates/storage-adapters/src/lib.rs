//! forum-engine/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the `domains` repository ports.
//!
//! - [`memory::InMemoryStore`] is always compiled.
//! - [`postgres::PgStore`] needs the `db-postgres` feature.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::InMemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
