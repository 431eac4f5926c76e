//! Inbound envelope validation pipeline (spec §4.G): integrity, size,
//! timestamp, sender binding, and signature, in that order. Steps 1-2 fail
//! with [`CoreError::Validation`]; steps 3-5 fail with [`CoreError::Security`].
//! Both are non-fatal to the room session — the caller drops the message
//! and surfaces the error, but `Security` failures should always be logged
//! (and may one day trigger quarantine; not implemented here).

use log::warn;

use common::PeerId;

use crate::constants::MAX_CIPHERTEXT_LEN;
use crate::envelope::{Envelope, Payload};
use crate::errors::CoreError;

/// Facts about the inbound transport delivery that the pipeline needs but
/// that the envelope itself doesn't carry.
pub struct ValidationContext<'a> {
    /// The peer id the transport layer reports as the actual sender —
    /// compared against the envelope's self-declared `sender.peer_id`.
    pub transport_sender: &'a PeerId,
    /// The local clock, in microseconds, used for the not-in-the-future
    /// check.
    pub now_micros: i64,
}

/// Run the full pipeline; on success, returns the decoded payload. Every
/// `Security` failure is logged at `warn` (spec §7: "`SecurityError` is
/// always surfaced") before being returned to the caller.
pub fn validate(envelope: &Envelope, ctx: &ValidationContext) -> Result<Payload, CoreError> {
    match validate_inner(envelope, ctx) {
        Err(CoreError::Security(detail)) => {
            warn!(
                "envelope from {} rejected: {}",
                ctx.transport_sender, detail
            );
            Err(CoreError::Security(detail))
        }
        other => other,
    }
}

fn validate_inner(envelope: &Envelope, ctx: &ValidationContext) -> Result<Payload, CoreError> {
    // 1. Integrity: type dispatch + required fields.
    let payload = envelope.decode_payload()?;

    // 2. Size bound on chat ciphertext.
    if let Payload::Chat(chat) = &payload {
        if chat.ciphertext.len() > MAX_CIPHERTEXT_LEN {
            return Err(CoreError::validation("chat ciphertext exceeds maximum size"));
        }
    }

    // 3. Timestamp not in the future.
    if envelope.timestamp_micros > ctx.now_micros {
        return Err(CoreError::security("timestamp is in the future"));
    }

    // A synthesized placeholder sender carries no usable key; refuse before
    // even trying to verify.
    if envelope.sender.is_unknown() {
        return Err(CoreError::security("sender is not in the peer directory"));
    }

    // 4. Sender binding.
    if &envelope.sender.peer_id != ctx.transport_sender {
        return Err(CoreError::security("sender does not match transport-reported peer"));
    }

    // 5. Signature.
    if !envelope.verify_signature() {
        return Err(CoreError::security("signature verification failed"));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::payloads::JoinMessage;
    use crate::signing::generate_keypair;
    use common::User;

    fn user(peer_id: &str, pub_key: Vec<u8>) -> User {
        User {
            peer_id: PeerId::from(peer_id),
            username: "alice".to_string(),
            preferred_color: "teal".to_string(),
            dilithium_pub: pub_key,
            kyber_pub: Vec::new(),
            libp2p_pub: Vec::new(),
        }
    }

    #[test]
    fn valid_envelope_passes_all_steps() {
        let (pk, sk) = generate_keypair();
        let sender = user("alice", pk);
        let bytes = Envelope::marshal(&Payload::Join(JoinMessage {}), sender, &sk, 1_000).unwrap();
        let env = Envelope::decode(&bytes).unwrap();

        let transport_sender = PeerId::from("alice");
        let ctx = ValidationContext {
            transport_sender: &transport_sender,
            now_micros: 2_000,
        };
        assert!(validate(&env, &ctx).is_ok());
    }

    #[test]
    fn future_timestamp_is_a_security_error() {
        let (pk, sk) = generate_keypair();
        let sender = user("alice", pk);
        let bytes =
            Envelope::marshal(&Payload::Join(JoinMessage {}), sender, &sk, 10_000_000).unwrap();
        let env = Envelope::decode(&bytes).unwrap();

        let transport_sender = PeerId::from("alice");
        let ctx = ValidationContext {
            transport_sender: &transport_sender,
            now_micros: 1,
        };
        let err = validate(&env, &ctx).unwrap_err();
        assert!(err.is_security());
    }

    #[test]
    fn sender_binding_mismatch_is_a_security_error() {
        let (pk, sk) = generate_keypair();
        let sender = user("alice", pk);
        let bytes = Envelope::marshal(&Payload::Join(JoinMessage {}), sender, &sk, 1).unwrap();
        let env = Envelope::decode(&bytes).unwrap();

        let transport_sender = PeerId::from("mallory");
        let ctx = ValidationContext {
            transport_sender: &transport_sender,
            now_micros: 2,
        };
        let err = validate(&env, &ctx).unwrap_err();
        assert!(err.is_security());
    }

    #[test]
    fn oversize_chat_ciphertext_is_a_validation_error() {
        use crate::cipher::ChatMessage;
        let (pk, sk) = generate_keypair();
        let sender = user("alice", pk);
        let chat = ChatMessage {
            chain_index: 0,
            ciphertext: vec![0u8; MAX_CIPHERTEXT_LEN + 1],
        };
        let bytes = Envelope::marshal(&Payload::Chat(chat), sender, &sk, 1).unwrap();
        let env = Envelope::decode(&bytes).unwrap();

        let transport_sender = PeerId::from("alice");
        let ctx = ValidationContext {
            transport_sender: &transport_sender,
            now_micros: 2,
        };
        let err = validate(&env, &ctx).unwrap_err();
        assert!(err.is_validation());
    }
}
