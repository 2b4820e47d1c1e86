//! Disk-backed object cache for ferrite.
//!
//! [`ObjectStoreCache`] maps `(bucket, object)` keys to local files under a
//! cache directory, fetching misses from the remote store through an
//! [`ferrite_core::ports::ObjectFetcher`] and evicting least-recently-used
//! entries to stay under the configured on-disk byte cap.

mod fetcher;
mod store;

pub use fetcher::HttpObjectFetcher;
pub use store::{CacheStats, ObjectStoreCache};
