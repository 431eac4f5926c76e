//! AEAD seal/open of chat payloads using a ratchet-derived key and nonce.
//!
//! Associated data is empty in the current design (see the open question on
//! binding `(room_id, chain_index, sender_peer_id)` as AD — left unresolved
//! upstream, so this crate matches the existing behavior rather than
//! guessing at a stronger one).

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};

use crate::constants::MAX_CIPHERTEXT_LEN;
use crate::errors::CoreError;
use crate::ratchet::{DerivedKey, Ratchet};

/// A sealed chat payload: the chain index the sender's ratchet was at when
/// it derived the key, and the ciphertext (including the AEAD tag).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub chain_index: u64,
    #[serde(with = "common::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Advance `ratchet` once, seal `plaintext` under the derived key/nonce, and
/// return a [`ChatMessage`] carrying the index that produced that key (i.e.
/// `ratchet.index() - 1` after the advance).
pub fn seal(ratchet: &mut Ratchet, plaintext: &[u8]) -> Result<ChatMessage, CoreError> {
    let derived = ratchet.next_key()?;
    let ciphertext = seal_with(&derived, plaintext)?;
    Ok(ChatMessage {
        chain_index: ratchet.index() - 1,
        ciphertext,
    })
}

/// Open a [`ChatMessage`] given the already-derived key/nonce for its
/// declared chain index. The caller (see [`crate::room::RoomKeyState`]) is
/// responsible for advancing the correct ratchet branch to that index
/// before calling this.
pub fn open(derived: &DerivedKey, message: &ChatMessage) -> Result<Vec<u8>, CoreError> {
    if message.ciphertext.len() > MAX_CIPHERTEXT_LEN {
        return Err(CoreError::validation("ciphertext exceeds maximum size"));
    }
    let cipher = ChaCha20Poly1305::new(derived.key.as_slice().into());
    let nonce = Nonce::from_slice(&derived.nonce);
    cipher
        .decrypt(nonce, message.ciphertext.as_slice())
        .map_err(|_| CoreError::crypto("AEAD open failed"))
}

fn seal_with(derived: &DerivedKey, plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
    let cipher = ChaCha20Poly1305::new(derived.key.as_slice().into());
    let nonce = Nonce::from_slice(&derived.nonce);
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CoreError::crypto("AEAD seal failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CHAIN_KEY_LENGTH;

    #[test]
    fn seal_then_open_round_trips() {
        let mut sender = Ratchet::new([3u8; CHAIN_KEY_LENGTH], 0);
        let mut receiver = Ratchet::new([3u8; CHAIN_KEY_LENGTH], 0);

        let sealed = seal(&mut sender, b"hello").unwrap();
        assert_eq!(sealed.chain_index, 0);

        let derived = receiver.next_key().unwrap();
        let plaintext = open(&derived, &sealed).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let mut sender = Ratchet::new([5u8; CHAIN_KEY_LENGTH], 0);
        let mut receiver = Ratchet::new([5u8; CHAIN_KEY_LENGTH], 0);
        let mut sealed = seal(&mut sender, b"world").unwrap();
        sealed.ciphertext[0] ^= 0xFF;

        let derived = receiver.next_key().unwrap();
        assert!(open(&derived, &sealed).is_err());
    }

    #[test]
    fn oversize_ciphertext_rejected_before_decrypt() {
        let mut receiver = Ratchet::new([6u8; CHAIN_KEY_LENGTH], 0);
        let derived = receiver.next_key().unwrap();
        let message = ChatMessage {
            chain_index: 0,
            ciphertext: vec![0u8; MAX_CIPHERTEXT_LEN + 1],
        };
        let err = open(&derived, &message).unwrap_err();
        assert!(err.is_validation());
    }
}
