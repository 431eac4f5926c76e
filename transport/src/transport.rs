//! The narrow seam between the secure-messaging core and whatever gossip
//! overlay actually joins/publishes/subscribes to topics. The core only
//! ever sees "publish to a topic" and "await the next message on a topic"
//! (spec §1, out-of-scope collaborators) — this trait is that interface.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::PeerId;
use protocol::CoreError;

/// Implemented by whatever gossip/pubsub layer a deployment wires in.
/// Every suspension point takes a [`CancellationToken`] so a room leave or
/// application shutdown can unblock it (spec §5).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join (subscribe to) a topic. Idempotent: joining an already-joined
    /// topic is a no-op.
    async fn join(&self, topic: &str) -> Result<(), CoreError>;

    /// Leave a previously joined topic, releasing any local subscription
    /// state. Idempotent.
    async fn leave(&self, topic: &str) -> Result<(), CoreError>;

    /// Publish `bytes` to `topic`. The topic must already be joined.
    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), CoreError>;

    /// Await the next message delivered on `topic`, or `None` if `cancel`
    /// fires first. The returned peer id is the transport-observed
    /// propagator of the message (e.g. a gossipsub message's propagation
    /// source) — the sender-binding check in the validation pipeline
    /// (spec §4.G step 4) compares this against the envelope's
    /// self-declared sender.
    async fn next_message(
        &self,
        topic: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<(PeerId, Vec<u8>)>, CoreError>;
}
