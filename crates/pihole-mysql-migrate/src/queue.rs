//! Bounded FIFO hand-off of batches from the reader to the writer.
//!
//! There is exactly one sender. Dropping it closes the queue: the receiver
//! still yields every batch already queued, then returns `None`.

use tokio::sync::mpsc;

use crate::core::Batch;

/// Constructor for the reader/writer channel pair.
pub struct LoadQueue;

impl LoadQueue {
    /// Create a queue holding at most `capacity` batches (minimum 1).
    pub fn bounded(capacity: usize) -> (LoadSender, LoadReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (LoadSender { tx }, LoadReceiver { rx })
    }
}

/// Producing half, owned by the enrichment task.
#[derive(Debug)]
pub struct LoadSender {
    tx: mpsc::Sender<Batch>,
}

impl LoadSender {
    /// Enqueue a batch, waiting while the queue is full.
    ///
    /// Returns the batch back if the receiver has been dropped.
    pub async fn enqueue(&self, batch: Batch) -> std::result::Result<(), Batch> {
        self.tx.send(batch).await.map_err(|e| e.0)
    }

    /// Whether the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consuming half, owned by the batch writer.
#[derive(Debug)]
pub struct LoadReceiver {
    rx: mpsc::Receiver<Batch>,
}

impl LoadReceiver {
    /// Wait for the next batch; `None` once the sender is gone and the queue is drained.
    pub async fn next(&mut self) -> Option<Batch> {
        self.rx.recv().await
    }

    /// Stop accepting new batches; queued ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
