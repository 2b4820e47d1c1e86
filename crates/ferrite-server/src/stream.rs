//! The chunked streaming pipeline.
//!
//! Moves a cached file to the client transport in fixed-size chunks. Every
//! chunk holds a [`MemoryBudget`] reservation from read to emit and is
//! accounted against the client's bandwidth window before it is sent. The
//! QoS concurrency slot is held for the whole transfer and released exactly
//! once through a drop guard, on every exit path including client
//! disconnect.

use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use ferrite_core::{MemoryBudget, STREAM_CHUNK_SIZE};
use ferrite_qos::QosController;
use futures::SinkExt;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Owns one admitted concurrency slot. Dropping it releases the slot, so no
/// exit path can leave `active_requests` elevated.
pub struct QosSlot {
    qos: Arc<QosController>,
    client: String,
}

impl QosSlot {
    /// Wrap a slot that [`QosController::admit`] already granted.
    pub fn new(qos: Arc<QosController>, client: String) -> Self {
        Self { qos, client }
    }

    pub fn client(&self) -> &str {
        &self.client
    }
}

impl Drop for QosSlot {
    fn drop(&mut self) {
        self.qos.release(&self.client);
    }
}

/// Build a chunked response body streaming `file` to the client.
///
/// The transfer loop runs on its own task: reserve one chunk of budget,
/// read, throttle, emit, release. A failed emit means the client went away;
/// the loop stops and the slot guard cleans up.
pub fn stream_body(file: File, slot: QosSlot, budget: Arc<MemoryBudget>) -> Body {
    let (mut tx, rx) = futures::channel::mpsc::channel::<Result<Bytes, std::io::Error>>(1);

    tokio::spawn(async move {
        let mut file = file;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

        loop {
            budget.acquire(STREAM_CHUNK_SIZE as u64).await;

            let read = file.read(&mut buf).await;
            let n = match read {
                Ok(n) => n,
                Err(err) => {
                    budget.release(STREAM_CHUNK_SIZE as u64);
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };
            if n == 0 {
                budget.release(STREAM_CHUNK_SIZE as u64);
                debug!(client = slot.client(), "stream complete");
                return;
            }

            slot.qos.throttle(slot.client(), n as u64).await;
            let sent = tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await;
            budget.release(STREAM_CHUNK_SIZE as u64);

            if sent.is_err() {
                debug!(client = slot.client(), "client disconnected mid-stream");
                return;
            }
        }
    });

    Body::from_stream(rx)
}
