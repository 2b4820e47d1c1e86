//! ferrite core
//!
//! Shared vocabulary for the ferrite caching proxy: error taxonomy,
//! configuration, port traits, and the global memory budget. This crate has
//! minimal dependencies and is consumed by every other crate in the
//! workspace.

pub mod budget;
pub mod config;
pub mod error;
pub mod key;
pub mod ports;

pub use budget::MemoryBudget;
pub use error::{Error, Result};
pub use key::ObjectKey;

/// Size of one transfer chunk moved between the cache file and the client
/// transport. Every in-flight chunk holds a reservation of this size against
/// the [`MemoryBudget`].
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;
