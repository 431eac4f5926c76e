//! Responder side of the catch-up protocol (spec §4.F): answer a request
//! by bundling the local database's backlog, the local auth row, and
//! publishing to the requester-specific response topic.

use log::warn;

use common::{RoomId, ServerId, User};
use protocol::envelope::{Envelope, Payload};
use protocol::payloads::CatchUpResponse;
use protocol::CoreError;
use storage::Store;
use transport::{topics, Transport};

use crate::framing;

/// Cap on how many stored envelopes a single catch-up response bundles
/// (spec §4.F: "suggested 100 or 1 000").
pub const DEFAULT_MESSAGE_CAP: usize = 500;

/// Build and publish a response to a [`protocol::payloads::CatchUpRequest`]
/// observed on the room's request topic. `requester` is the transport-
/// reported sender of that request. Errors building the payload are
/// embedded in the response's `error` field rather than propagated, so the
/// requester doesn't hang waiting on a response that never comes.
pub async fn respond<T: Transport>(
    transport: &T,
    store: &Store,
    server: &ServerId,
    room: &RoomId,
    requester: &common::PeerId,
    local_user: &User,
    local_secret_key: &[u8],
    now_micros: i64,
    message_cap: usize,
) -> Result<(), CoreError> {
    let response = build_response(store, room, message_cap);
    let topic = topics::catchup_response(server, room, requester);
    let bytes = Envelope::marshal(
        &Payload::CatchUpResponse(response),
        local_user.clone(),
        local_secret_key,
        now_micros,
    )?;
    transport.publish(&topic, bytes).await
}

fn build_response(store: &Store, room: &RoomId, message_cap: usize) -> CatchUpResponse {
    let auth = match store.get_auth(room) {
        Ok(auth) if !auth.tombstone => auth,
        Ok(_) => {
            warn!("catch-up request for room {} refused: this peer has left it", room);
            return CatchUpResponse::error("this peer has left the room");
        }
        Err(e) => {
            warn!("catch-up request for room {} refused: {}", room, e);
            return CatchUpResponse::error(format!("no local auth row: {}", e));
        }
    };

    let messages = match store.get_latest_messages(room, message_cap) {
        Ok(messages) => messages,
        Err(e) => {
            warn!("catch-up backlog read failed for room {}: {}", room, e);
            return CatchUpResponse::error(format!("failed to read backlog: {}", e));
        }
    };

    let framed = match framing::encode(&messages) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("catch-up backlog framing failed for room {}: {}", room, e);
            return CatchUpResponse::error(format!("failed to frame backlog: {}", e));
        }
    };

    CatchUpResponse {
        chain_index: auth.chain_index,
        // Upstream copies the master key into the "base" field verbatim
        // rather than a PoW-derived value (spec §9 open question 3); this
        // mirrors that rather than inventing a transformation.
        master_room_key_base: auth.master_ratchet_key.clone(),
        master_room_key: auth.master_ratchet_key,
        catchup_messages: framed,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PeerId;
    use protocol::signing::generate_keypair;
    use transport::MemoryTransport;

    fn user(peer_id: &str, pub_key: Vec<u8>) -> User {
        User {
            peer_id: PeerId::from(peer_id),
            username: peer_id.to_string(),
            preferred_color: "teal".to_string(),
            dilithium_pub: pub_key,
            kyber_pub: Vec::new(),
            libp2p_pub: Vec::new(),
        }
    }

    #[tokio::test]
    async fn responder_reports_error_when_no_auth_row_exists() {
        let store = Store::open_in_memory().unwrap();
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        let server = ServerId::from("server-1");
        let room = RoomId::from("room-1");
        let requester = PeerId::from("bob");
        let (pk, sk) = generate_keypair();
        let alice = user("alice", pk);

        transport.join(&topics::catchup_response(&server, &room, &requester)).await.unwrap();
        respond(&transport, &store, &server, &room, &requester, &alice, &sk, 1, DEFAULT_MESSAGE_CAP)
            .await
            .unwrap();

        let cancel = transport::CancellationToken::new();
        let (_sender, bytes) = transport
            .next_message(&topics::catchup_response(&server, &room, &requester), &cancel)
            .await
            .unwrap()
            .unwrap();
        let envelope = Envelope::decode(&bytes).unwrap();
        let Payload::CatchUpResponse(response) = envelope.decode_payload().unwrap() else {
            panic!("expected a catchup response payload");
        };
        assert!(response.error.is_some());
    }

    #[test]
    fn responder_reports_error_for_a_tombstoned_room() {
        let store = Store::open_in_memory().unwrap();
        let room = RoomId::from("room-1");
        store.save_auth(&room, 3, &[7u8; 32], 10).unwrap();
        store.soft_delete_auth(&room).unwrap();

        let response = build_response(&store, &room, DEFAULT_MESSAGE_CAP);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn responder_bundles_auth_and_backlog_when_present() {
        let store = Store::open_in_memory().unwrap();
        store.save_auth(&RoomId::from("room-1"), 3, &[7u8; 32], 10).unwrap();

        let response = build_response(&store, &RoomId::from("room-1"), DEFAULT_MESSAGE_CAP);
        assert!(response.error.is_none());
        assert_eq!(response.chain_index, 3);
        assert_eq!(response.master_room_key, vec![7u8; 32]);
    }
}
