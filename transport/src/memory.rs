//! An in-process [`Transport`] backed by broadcast channels — a fixture for
//! exercising `catchup`/room-session logic without a real gossip overlay.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::warn;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use common::PeerId;
use protocol::CoreError;

use crate::transport::Transport;

const CHANNEL_CAPACITY: usize = 256;

pub type Bus = std::sync::Arc<Mutex<HashMap<String, broadcast::Sender<(PeerId, Vec<u8>)>>>>;

/// One handle onto a shared bus of named topics, tagged with the local
/// peer id so other handles see who propagated each message. Clone a
/// handle returned by [`MemoryTransport::peer`] to get another connection
/// for the same simulated peer; call [`MemoryTransport::peer`] again on
/// the same bus for a different one.
#[derive(Clone)]
pub struct MemoryTransport {
    local_peer: PeerId,
    topics: Bus,
    subscribed: std::sync::Arc<Mutex<HashMap<String, broadcast::Receiver<(PeerId, Vec<u8>)>>>>,
}

impl MemoryTransport {
    /// A fresh bus with no peers on it yet.
    pub fn new_bus() -> Bus {
        std::sync::Arc::new(Mutex::new(HashMap::new()))
    }

    /// A handle for `local_peer` onto `bus`. Pass the same `bus` to
    /// simulate multiple peers talking to each other in one process.
    pub fn peer(bus: &Bus, local_peer: PeerId) -> Self {
        MemoryTransport {
            local_peer,
            topics: bus.clone(),
            subscribed: std::sync::Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A standalone single-peer transport on its own fresh bus.
    pub fn standalone(local_peer: PeerId) -> Self {
        Self::peer(&Self::new_bus(), local_peer)
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<(PeerId, Vec<u8>)> {
        let mut topics = self.topics.lock().expect("topics mutex poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn join(&self, topic: &str) -> Result<(), CoreError> {
        let receiver = self.sender_for(topic).subscribe();
        self.subscribed
            .lock()
            .expect("subscribed mutex poisoned")
            .insert(topic.to_string(), receiver);
        Ok(())
    }

    async fn leave(&self, topic: &str) -> Result<(), CoreError> {
        self.subscribed.lock().expect("subscribed mutex poisoned").remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), CoreError> {
        // No subscribers yet is not an error: broadcast::send only fails
        // when there are zero receivers, which simply means nobody is
        // listening right now.
        let _ = self.sender_for(topic).send((self.local_peer.clone(), bytes));
        Ok(())
    }

    async fn next_message(
        &self,
        topic: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<(PeerId, Vec<u8>)>, CoreError> {
        loop {
            let mut receiver = {
                let mut subscribed = self.subscribed.lock().expect("subscribed mutex poisoned");
                match subscribed.remove(topic) {
                    Some(r) => r,
                    None => return Err(CoreError::protocol(format!("topic not joined: {}", topic))),
                }
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                received = receiver.recv() => Some(received),
            };

            self.subscribed
                .lock()
                .expect("subscribed mutex poisoned")
                .insert(topic.to_string(), receiver);

            match outcome {
                None => return Ok(None),
                Some(Ok(message)) => return Ok(Some(message)),
                // A lagging receiver skipped messages; retry to get the
                // next one rather than surfacing an internal detail.
                Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!("subscriber on topic {} lagged, skipped {} message(s)", topic, skipped);
                    continue;
                }
                Some(Err(broadcast::error::RecvError::Closed)) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive_round_trips_with_sender() {
        let bus = MemoryTransport::new_bus();
        let alice = MemoryTransport::peer(&bus, PeerId::from("alice"));
        let bob = MemoryTransport::peer(&bus, PeerId::from("bob"));

        bob.join("room-1").await.unwrap();
        alice.publish("room-1", b"hello".to_vec()).await.unwrap();

        let cancel = CancellationToken::new();
        let (sender, bytes) = bob.next_message("room-1", &cancel).await.unwrap().unwrap();
        assert_eq!(sender, PeerId::from("alice"));
        assert_eq!(bytes, b"hello".to_vec());
    }

    #[tokio::test]
    async fn cancellation_unblocks_next_message() {
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        transport.join("room-1").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let received = transport.next_message("room-1", &cancel).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn next_message_on_unjoined_topic_is_a_protocol_error() {
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        let cancel = CancellationToken::new();
        let err = transport.next_message("nope", &cancel).await.unwrap_err();
        assert!(matches!(err, CoreError::Protocol(_)));
    }
}
