//! Requester side of the catch-up protocol (spec §4.F): obtain
//! `master_room_key`, the live `chain_index`, and the envelope backlog from
//! whichever peer answers first.

use std::time::Duration;

use log::{info, warn};

use common::{PeerId, RoomId, ServerId, User};
use protocol::envelope::{Envelope, EnvelopeType, Payload};
use protocol::payloads::CatchUpRequest;
use protocol::room::RoomKeyState;
use protocol::validation::{self, ValidationContext};
use protocol::CoreError;
use storage::{NewMessage, Store};
use transport::{topics, CancellationToken, Transport};

use crate::framing;

/// Configuration for the retry loop; mirrors `common::Config`'s
/// `catchup_retries` / `catchup_timeout_secs`.
pub struct RequesterOptions {
    pub attempts: u32,
    pub timeout_per_attempt: Duration,
    pub backup_window: u64,
    pub max_chain_jump: u64,
}

impl Default for RequesterOptions {
    fn default() -> Self {
        RequesterOptions {
            attempts: 5,
            timeout_per_attempt: Duration::from_secs(1),
            backup_window: 10,
            max_chain_jump: 10_000,
        }
    }
}

/// Current time in microseconds since epoch, fed in by the caller so this
/// module stays free of a direct system-clock dependency (and so tests can
/// pin it).
pub type NowMicros = i64;

/// Run the requester side to completion: join the response topic, publish
/// `CatchUpRequest{}` up to `options.attempts` times, accept the first
/// valid response, validate and persist its backlog, and return the
/// installed room key state.
pub async fn run<T: Transport>(
    transport: &T,
    store: &mut Store,
    server: &ServerId,
    room: &RoomId,
    local_user: &User,
    local_secret_key: &[u8],
    now_micros: NowMicros,
    cancel: &CancellationToken,
    options: &RequesterOptions,
) -> Result<RoomKeyState, CoreError> {
    let response_topic = topics::catchup_response(server, room, &local_user.peer_id);
    transport.join(&response_topic).await?;

    let request_topic = topics::catchup_request(server, room);
    let request_bytes = Envelope::marshal(
        &Payload::CatchUpRequest(CatchUpRequest {}),
        local_user.clone(),
        local_secret_key,
        now_micros,
    )?;

    let mut last_error = CoreError::timeout("no catch-up response received");

    for attempt in 0..options.attempts {
        info!("catch-up request for room {} (attempt {}/{})", room, attempt + 1, options.attempts);
        transport.publish(&request_topic, request_bytes.clone()).await?;

        match tokio::time::timeout(
            options.timeout_per_attempt,
            await_valid_response(transport, &response_topic, now_micros, cancel),
        )
        .await
        {
            Ok(Ok(Some(response))) => {
                return install(store, server, room, response, now_micros, options).await;
            }
            Ok(Ok(None)) => return Err(CoreError::timeout("catch-up cancelled")),
            Ok(Err(e)) => {
                warn!("catch-up attempt for room {} failed: {}", room, e);
                last_error = e;
            }
            Err(_elapsed) => continue,
        }
    }

    warn!("catch-up for room {} exhausted {} attempts", room, options.attempts);
    transport.leave(&response_topic).await.ok();
    Err(last_error)
}

/// Await responses on `response_topic` until one passes the acceptance
/// checks (parses, verifies, sender binds, not from the future), or the
/// per-attempt deadline / cancellation cuts it off first.
async fn await_valid_response<T: Transport>(
    transport: &T,
    response_topic: &str,
    now_micros: NowMicros,
    cancel: &CancellationToken,
) -> Result<Option<protocol::payloads::CatchUpResponse>, CoreError> {
    loop {
        let Some((observed_sender, bytes)) = transport.next_message(response_topic, cancel).await? else {
            return Ok(None);
        };

        let Ok(envelope) = Envelope::decode(&bytes) else {
            continue;
        };
        if envelope.envelope_type != EnvelopeType::CatchUpResponse {
            continue;
        }
        let ctx = ValidationContext {
            transport_sender: &observed_sender,
            now_micros,
        };
        let Ok(Payload::CatchUpResponse(response)) = validation::validate(&envelope, &ctx) else {
            continue;
        };
        return Ok(Some(response));
    }
}

/// Step 5-7 of the requester flow: surface a responder-reported error,
/// install the ratchet pair, and replay the backlog.
async fn install(
    store: &mut Store,
    server: &ServerId,
    room: &RoomId,
    response: protocol::payloads::CatchUpResponse,
    now_micros: NowMicros,
    options: &RequesterOptions,
) -> Result<RoomKeyState, CoreError> {
    if let Some(message) = response.error {
        return Err(CoreError::protocol(format!("catch-up failed: {}", message)));
    }

    let mut chain_key = [0u8; protocol::constants::CHAIN_KEY_LENGTH];
    if response.master_room_key.len() != chain_key.len() {
        return Err(CoreError::crypto("master room key has the wrong length"));
    }
    chain_key.copy_from_slice(&response.master_room_key);

    let entries = framing::decode(&response.catchup_messages)?;
    let mut batch = Vec::with_capacity(entries.len());
    for entry in &entries {
        let sender = store.get_user_by_id(&entry.sender_id)?;
        let envelope = Envelope {
            envelope_type: EnvelopeType::from_wire_str(&entry.envelope_type),
            sender,
            timestamp_micros: entry.timestamp_micros,
            signature: entry.signature.clone(),
            payload_bytes: entry.payload.clone(),
        };
        let ctx = ValidationContext {
            transport_sender: &entry.sender_id,
            now_micros,
        };
        validation::validate(&envelope, &ctx)?;

        batch.push(NewMessage {
            room_id: room.clone(),
            server_id: server.clone(),
            chain_index: entry.chain_index,
            envelope_type: entry.envelope_type.clone(),
            sender_id: entry.sender_id.clone(),
            timestamp_micros: entry.timestamp_micros,
            signature: entry.signature.clone(),
            payload: entry.payload.clone(),
        });
    }
    store.save_envelopes_batch(&batch)?;
    store.save_auth(room, response.chain_index, &response.master_room_key, now_micros)?;

    Ok(RoomKeyState::with_params(
        chain_key,
        response.chain_index,
        options.backup_window,
        options.max_chain_jump,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn requester_times_out_when_nobody_answers() {
        let transport = MemoryTransport::standalone(PeerId::from("bob"));
        let mut store = Store::open_in_memory().unwrap();
        let server = ServerId::from("server-1");
        let room = RoomId::from("room-1");
        let (pk, sk) = generate_keypair();
        let bob = user("bob", pk);
        let cancel = CancellationToken::new();

        let options = RequesterOptions {
            attempts: 1,
            timeout_per_attempt: Duration::from_millis(20),
            ..RequesterOptions::default()
        };

        let result = run(&transport, &mut store, &server, &room, &bob, &sk, 1, &cancel, &options).await;
        assert!(result.is_err());
    }
}
