//! Port traits between the core and external adapters.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Stream of body chunks from the remote store.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Capability to read one object from the remote store.
///
/// Implementations must deliver the complete object or fail; the core never
/// retries and never caches a failed transfer.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Fetch the object body for `(bucket, key)`.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<ByteStream>;
}
