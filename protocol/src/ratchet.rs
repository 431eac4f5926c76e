//! Symmetric forward-secret ratchet.
//!
//! A `Ratchet` holds a 32-byte chain key and a monotone step counter. Each
//! call to [`Ratchet::next_key`] derives a fresh message key and nonce via
//! HKDF-SHA256, then advances the chain key one-way via HMAC-SHA256. The
//! previous chain key is not recoverable from the next one, so compromising
//! the ratchet at step `k` does not expose steps `< k`.
//!
//! A room session keeps two of these (current and backup); see
//! [`crate::room::RoomKeyState`] for how they cooperate to decrypt
//! out-of-order messages.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::constants::{CHAIN_ADVANCE_LABEL, CHAIN_KEY_LENGTH, MESSAGE_KEY_LENGTH, NONCE_LENGTH};
use crate::errors::CoreError;

/// Generate a fresh room master key the way a room creator does: draw 32
/// random bytes (the "base") and hash them with SHA-256 to get the key the
/// ratchet actually chains from. Returns `(master_key, master_key_base)`.
///
/// The base is carried separately because it is also the hook for the
/// proof-of-work scheme gated on catch-up (spec §9 open question 3, Non-
/// goals §1) — that transformation is not implemented here, so the base is
/// currently just the random seed the master key was hashed from.
pub fn generate_master_key() -> ([u8; CHAIN_KEY_LENGTH], [u8; CHAIN_KEY_LENGTH]) {
    let mut base = [0u8; CHAIN_KEY_LENGTH];
    OsRng.fill_bytes(&mut base);
    let digest = Sha256::digest(base);
    let mut master_key = [0u8; CHAIN_KEY_LENGTH];
    master_key.copy_from_slice(&digest);
    (master_key, base)
}

/// A derived per-message key and nonce, ready for use with the AEAD in
/// [`crate::cipher`].
#[derive(Clone)]
pub struct DerivedKey {
    pub key: [u8; MESSAGE_KEY_LENGTH],
    pub nonce: [u8; NONCE_LENGTH],
}

/// Symmetric ratchet state: `{chain_key, index}`. `chain_key` is never
/// zero-length after construction; `index` only ever increases.
#[derive(Clone)]
pub struct Ratchet {
    chain_key: [u8; CHAIN_KEY_LENGTH],
    index: u64,
}

impl Ratchet {
    /// Build a ratchet from a master key at a given starting index — the
    /// shape both "created by room creator" (index 0, random key) and
    /// "installed from catch-up" (arbitrary index, master key) take.
    pub fn new(chain_key: [u8; CHAIN_KEY_LENGTH], index: u64) -> Self {
        Ratchet { chain_key, index }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Derive this step's `(message_key, nonce)`, advance the chain key, and
    /// increment the index. Deterministic: the same starting state always
    /// produces the same derived key and the same next state.
    pub fn next_key(&mut self) -> Result<DerivedKey, CoreError> {
        let info = self.index.to_be_bytes();
        let hk = Hkdf::<Sha256>::new(Some(&[]), &self.chain_key);

        let mut okm = [0u8; MESSAGE_KEY_LENGTH + NONCE_LENGTH];
        hk.expand(&info, &mut okm)?;

        let mut key = [0u8; MESSAGE_KEY_LENGTH];
        let mut nonce = [0u8; NONCE_LENGTH];
        key.copy_from_slice(&okm[..MESSAGE_KEY_LENGTH]);
        nonce.copy_from_slice(&okm[MESSAGE_KEY_LENGTH..]);
        okm.zeroize();

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.chain_key)
            .map_err(|e| CoreError::crypto(format!("invalid HMAC key length: {}", e)))?;
        mac.update(CHAIN_ADVANCE_LABEL);
        let next = mac.finalize().into_bytes();
        self.chain_key.copy_from_slice(&next);
        self.index += 1;

        Ok(DerivedKey { key, nonce })
    }
}

impl Drop for Ratchet {
    fn drop(&mut self) {
        self.chain_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_master_key_is_the_hash_of_its_base() {
        let (master_key, base) = generate_master_key();
        let digest = Sha256::digest(base);
        assert_eq!(&master_key[..], &digest[..]);
    }

    #[test]
    fn successive_generated_master_keys_differ() {
        let (a, _) = generate_master_key();
        let (b, _) = generate_master_key();
        assert_ne!(a, b);
    }

    #[test]
    fn advances_index_deterministically() {
        let mut r = Ratchet::new([7u8; CHAIN_KEY_LENGTH], 0);
        for expected in 0..5u64 {
            assert_eq!(r.index(), expected);
            r.next_key().unwrap();
        }
        assert_eq!(r.index(), 5);
    }

    #[test]
    fn successive_keys_are_distinct() {
        let mut r = Ratchet::new([1u8; CHAIN_KEY_LENGTH], 0);
        let a = r.next_key().unwrap();
        let b = r.next_key().unwrap();
        assert_ne!(a.key, b.key);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn clone_matches_original_until_they_diverge() {
        let mut r = Ratchet::new([9u8; CHAIN_KEY_LENGTH], 3);
        let mut clone = r.clone();
        let from_original = r.next_key().unwrap();
        let from_clone = clone.next_key().unwrap();
        assert_eq!(from_original.key, from_clone.key);
        assert_eq!(from_original.nonce, from_clone.nonce);
        assert_eq!(r.index(), clone.index());
    }

    #[test]
    fn same_state_reproduces_same_output() {
        let mut a = Ratchet::new([42u8; CHAIN_KEY_LENGTH], 10);
        let mut b = Ratchet::new([42u8; CHAIN_KEY_LENGTH], 10);
        let ka = a.next_key().unwrap();
        let kb = b.next_key().unwrap();
        assert_eq!(ka.key, kb.key);
        assert_eq!(ka.nonce, kb.nonce);
        assert_eq!(a.index(), b.index());
    }
}
