//! forum-engine/crates/domains/src/lib.rs
//!
//! Domain model, ordering rules and storage ports for the forum engine.

pub mod batch;
pub mod errors;
pub mod listing;
pub mod models;
pub mod path;
pub mod ports;

// Re-exporting for easier access in other crates
pub use batch::{BatchContext, BatchInsert};
pub use errors::{DomainError, DomainResult};
pub use listing::{arrange, Cursor, PostListQuery, SortMode};
pub use models::*;
pub use path::PostPath;
pub use ports::*;
