//! Long-term signing keys, represented as opaque byte buffers at this
//! layer — the concrete Dilithium2 (ML-DSA-44) objects are constructed only
//! inside this façade, matching the "interface-typed crypto keys" REDESIGN
//! FLAG: callers never see a `pqcrypto` type.

use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::{
    DetachedSignature as DetachedSignatureTrait, PublicKey as PublicKeyTrait,
    SecretKey as SecretKeyTrait,
};

use crate::errors::CoreError;

/// Sign `payload` with a Dilithium2 secret key given as raw bytes. Returns
/// the detached signature bytes that go in an envelope's `signature` field.
pub fn sign(secret_key_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>, CoreError> {
    let sk = dilithium2::SecretKey::from_bytes(secret_key_bytes)
        .map_err(|_| CoreError::crypto("malformed dilithium secret key"))?;
    let signature = dilithium2::detached_sign(payload, &sk);
    Ok(signature.as_bytes().to_vec())
}

/// Verify a detached signature over `payload` against a Dilithium2 public
/// key given as raw bytes. Never panics on malformed input — a bad key or
/// signature buffer is just a failed verification.
pub fn verify(public_key_bytes: &[u8], payload: &[u8], signature_bytes: &[u8]) -> bool {
    let Ok(pk) = dilithium2::PublicKey::from_bytes(public_key_bytes) else {
        return false;
    };
    let Ok(signature) = dilithium2::DetachedSignature::from_bytes(signature_bytes) else {
        return false;
    };
    dilithium2::verify_detached_signature(&signature, payload, &pk).is_ok()
}

/// Generate a fresh Dilithium2 keypair, returned as raw byte buffers. Used
/// by test fixtures and by anything bootstrapping a new identity; routine
/// profile creation lives outside this crate.
pub fn generate_keypair() -> (Vec<u8>, Vec<u8>) {
    let (pk, sk) = dilithium2::keypair();
    (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
}
