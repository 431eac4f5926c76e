//! Full round-trip exercise of the catch-up protocol end to end: a
//! responder with an established room and a backlog of chat envelopes,
//! and a requester with an empty local database, talking over
//! [`transport::MemoryTransport`]. This is the literal "catch-up happy
//! path" scenario from the testable-properties section — master key K,
//! chain index 12, 12 stored chat envelopes, requester ends Ready and
//! able to decrypt the responder's next send.

use common::{PeerId, RoomId, ServerId, User};
use protocol::envelope::{Envelope, Payload};
use protocol::signing::generate_keypair;
use storage::{NewMessage, PeerRow, Store};
use transport::{topics, CancellationToken, MemoryTransport, Transport};

use crate::requester::RequesterOptions;
use crate::responder;
use crate::session::{RoomSession, SessionState};

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
async fn catchup_happy_path_installs_state_and_decrypts_next_send() {
    let bus = MemoryTransport::new_bus();
    let alice_transport = MemoryTransport::peer(&bus, PeerId::from("alice"));
    let bob_transport = MemoryTransport::peer(&bus, PeerId::from("bob"));

    let server = ServerId::from("server-1");
    let room = RoomId::from("room-1");

    let (alice_pk, alice_sk) = generate_keypair();
    let alice = user("alice", alice_pk);
    let (bob_pk, bob_sk) = generate_keypair();
    let bob = user("bob", bob_pk);

    // Alice creates the room and sends 12 chat messages, persisting each
    // one the way a real session would on a successful encrypt.
    let mut alice_store = Store::open_in_memory().unwrap();
    let mut alice_session = RoomSession::new(server.clone(), room.clone());
    let options = RequesterOptions::default();
    alice_session
        .create(&alice_transport, &mut alice_store, 1, &options)
        .await
        .unwrap();

    for i in 0..12u64 {
        let plaintext = format!("message {}", i);
        let chat = alice_session
            .key_state_mut()
            .unwrap()
            .encrypt(plaintext.as_bytes())
            .unwrap();
        assert_eq!(chat.chain_index, i);

        let bytes = Envelope::marshal(&Payload::Chat(chat.clone()), alice.clone(), &alice_sk, 10 + i as i64)
            .unwrap();
        let envelope = Envelope::decode(&bytes).unwrap();
        alice_store
            .save_envelope(&NewMessage {
                room_id: room.clone(),
                server_id: server.clone(),
                chain_index: Some(i),
                envelope_type: "chat".to_string(),
                sender_id: PeerId::from("alice"),
                timestamp_micros: envelope.timestamp_micros,
                signature: envelope.signature.clone(),
                payload: envelope.payload_bytes.clone(),
            })
            .unwrap();
    }
    // Mirror the auth-row coupling (spec §4.D): every successful send
    // upserts chain_index while the master key stays the one `create`
    // persisted at room creation.
    let master_key = alice_store.get_auth(&room).unwrap().master_ratchet_key;
    alice_store.save_auth(&room, 12, &master_key, 30).unwrap();

    // Bob joins with an empty local database, which drives him into the
    // catch-up path. Run his requester loop concurrently with Alice
    // answering exactly one request on her already-joined request topic.
    //
    // Bob's peer directory already knows Alice's signing key (as it would
    // from an earlier member-list/`user_update` exchange — out of scope
    // for this crate) so the backlog's signatures can verify.
    let mut bob_store = Store::open_in_memory().unwrap();
    bob_store
        .save_user(&PeerRow {
            peer_id: PeerId::from("alice"),
            dilithium_pub: alice.dilithium_pub.clone(),
            kyber_pub: Vec::new(),
            libp2p_pub: Vec::new(),
            username: "alice".to_string(),
            preferred_color: "teal".to_string(),
            last_seen_micros: 1,
        })
        .unwrap();
    let mut bob_session = RoomSession::new(server.clone(), room.clone());
    let cancel = CancellationToken::new();

    let request_topic = topics::catchup_request(&server, &room);
    let respond_once = async {
        let (requester_peer, bytes) = alice_transport
            .next_message(&request_topic, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        let _ = Envelope::decode(&bytes).unwrap();
        responder::respond(
            &alice_transport,
            &alice_store,
            &server,
            &room,
            &requester_peer,
            &alice,
            &alice_sk,
            31,
            responder::DEFAULT_MESSAGE_CAP,
        )
        .await
        .unwrap();
    };

    let join_bob = bob_session.join(
        &bob_transport,
        &mut bob_store,
        &bob,
        &bob_sk,
        32,
        &cancel,
        &options,
    );

    let (_, join_result) = tokio::join!(respond_once, join_bob);
    join_result.unwrap();

    assert_eq!(bob_session.state(), SessionState::Ready);
    assert_eq!(bob_session.key_state_mut().unwrap().current_index(), 12);

    let persisted = bob_store.get_messages_since_chain_index(&room, 0, None).unwrap();
    assert_eq!(persisted.len(), 12);

    // Alice sends the next message; Bob, having installed equivalent
    // ratchet state, can decrypt it.
    let next = alice_session
        .key_state_mut()
        .unwrap()
        .encrypt(b"message 12")
        .unwrap();
    assert_eq!(next.chain_index, 12);
    let plaintext = bob_session.key_state_mut().unwrap().decrypt(&next).unwrap();
    assert_eq!(plaintext, b"message 12");
}
