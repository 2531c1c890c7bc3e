//! forum-engine/crates/services/src/lib.rs
//!
//! Use-case layer between callers and the repository ports. Services take
//! caller-shaped input (raw identifiers, sort tokens, `related` lists), turn
//! it into domain types once, and render results for callers.

pub mod posts;
pub mod threads;
pub mod views;

pub use posts::{ListParams, PostService};
pub use threads::ThreadService;
pub use views::{PostDetails, Related, ThreadView};
