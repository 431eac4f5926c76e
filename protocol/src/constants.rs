//! Fixed primitive sizes and protocol constants.

/// Length in bytes of a ratchet chain key / master room key.
pub const CHAIN_KEY_LENGTH: usize = 32;

/// Length in bytes of a derived AEAD message key.
pub const MESSAGE_KEY_LENGTH: usize = 32;

/// Length in bytes of a ChaCha20-Poly1305 nonce.
pub const NONCE_LENGTH: usize = 12;

/// Length in bytes of the ChaCha20-Poly1305 authentication tag.
pub const TAG_LENGTH: usize = 16;

/// HMAC label used to advance the chain key. ASCII bytes, no terminator.
pub const CHAIN_ADVANCE_LABEL: &[u8] = b"ratchet";

/// Default backup ratchet lag, in chain steps (spec §4.D, `W`).
pub const DEFAULT_BACKUP_WINDOW: u64 = 10;

/// Default safety cap on a single declared chain index jump (spec §4.D).
pub const DEFAULT_MAX_CHAIN_JUMP: u64 = 10_000;

/// Maximum chat ciphertext size accepted by the validation pipeline
/// (spec §4.G).
pub const MAX_CIPHERTEXT_LEN: usize = 10_000;
