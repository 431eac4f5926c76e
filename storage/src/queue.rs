//! Single-writer bounded-channel write queue.
//!
//! SQLite tolerates exactly one writer at a time comfortably; rather than
//! serialize writers behind a mutex on every call, every write goes through
//! one channel into a dedicated worker task that owns the [`Store`]
//! exclusively and batches inserts. This mirrors the spec's concurrency
//! model (§5): producers enqueue and move on, the worker flushes on a size
//! or time trigger, whichever comes first.

use std::time::Duration;

use log::{error, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use protocol::CoreError;

use crate::models::NewMessage;
use crate::store::Store;

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Default bound on the write queue's channel (spec §5: "bounded channel
/// (default capacity 1024)").
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What the queue does when its channel is full and a new write arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for room — back-pressures the caller.
    Block,
    /// Drop the write and report [`CoreError::Storage`] to the caller.
    Drop,
}

struct Enqueued {
    message: NewMessage,
    ack: Option<oneshot::Sender<Result<(), CoreError>>>,
}

/// A handle producers clone freely; the worker task is spawned once, owns
/// the `Store`, and outlives every handle that isn't dropped yet.
#[derive(Clone)]
pub struct WriteQueue {
    sender: mpsc::Sender<Enqueued>,
    overflow: OverflowPolicy,
}

impl WriteQueue {
    /// Spawn the worker task on the current Tokio runtime and return a
    /// handle. `capacity` bounds the channel; the worker flushes at
    /// `DEFAULT_BATCH_SIZE` items or every `DEFAULT_FLUSH_INTERVAL`,
    /// whichever happens first.
    pub fn spawn(store: Store, capacity: usize, overflow: OverflowPolicy) -> WriteQueue {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(run_worker(store, rx));
        WriteQueue { sender: tx, overflow }
    }

    /// Spawn with the spec's default channel capacity ([`DEFAULT_QUEUE_CAPACITY`]).
    /// The constructor a deployment reaches for unless it has a specific
    /// reason to size the channel differently.
    pub fn spawn_default(store: Store, overflow: OverflowPolicy) -> WriteQueue {
        Self::spawn(store, DEFAULT_QUEUE_CAPACITY, overflow)
    }

    /// Enqueue a write and wait for it to be durably flushed.
    ///
    /// Under [`OverflowPolicy::Block`] this waits for channel capacity;
    /// under [`OverflowPolicy::Drop`] a full channel fails immediately with
    /// [`CoreError::Storage`] instead of queueing.
    pub async fn save_envelope(&self, message: NewMessage) -> Result<(), CoreError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let item = Enqueued {
            message,
            ack: Some(ack_tx),
        };
        self.enqueue(item).await?;
        ack_rx
            .await
            .map_err(|_| CoreError::storage("write queue worker dropped before acknowledging"))?
    }

    /// Fire-and-forget variant for callers that don't need to wait for the
    /// flush (still subject to the overflow policy on enqueue).
    pub async fn save_envelope_no_wait(&self, message: NewMessage) -> Result<(), CoreError> {
        self.enqueue(Enqueued { message, ack: None }).await
    }

    async fn enqueue(&self, item: Enqueued) -> Result<(), CoreError> {
        match self.overflow {
            OverflowPolicy::Block => self
                .sender
                .send(item)
                .await
                .map_err(|_| CoreError::storage("write queue worker has shut down")),
            OverflowPolicy::Drop => self.sender.try_send(item).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("write queue full, dropping envelope");
                    CoreError::storage("write queue is full")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    CoreError::storage("write queue worker has shut down")
                }
            }),
        }
    }
}

async fn run_worker(mut store: Store, mut rx: mpsc::Receiver<Enqueued>) {
    let mut ticker = tokio::time::interval(DEFAULT_FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pending: Vec<Enqueued> = Vec::with_capacity(DEFAULT_BATCH_SIZE);

    loop {
        tokio::select! {
            item = rx.recv() => {
                match item {
                    Some(item) => {
                        pending.push(item);
                        if pending.len() >= DEFAULT_BATCH_SIZE {
                            flush(&mut store, &mut pending);
                        }
                    }
                    None => {
                        flush(&mut store, &mut pending);
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&mut store, &mut pending);
            }
        }
    }
}

fn flush(store: &mut Store, pending: &mut Vec<Enqueued>) {
    if pending.is_empty() {
        return;
    }
    let messages: Vec<NewMessage> = pending.iter().map(|e| e.message.clone()).collect();
    let result = store.save_envelopes_batch(&messages);
    if let Err(e) = &result {
        error!("batch of {} envelope(s) failed to persist: {}", messages.len(), e);
    }
    for item in pending.drain(..) {
        if let Some(ack) = item.ack {
            let outcome = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(CoreError::storage(e.to_string())),
            };
            let _ = ack.send(outcome);
        }
    }
}
