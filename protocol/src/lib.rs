//! The secure-messaging core: ratchet key schedule, signed envelope codec,
//! AEAD chat cipher, per-room key state, and the inbound validation
//! pipeline.
//!
//! Everything here is a value type with explicit ownership — there is no
//! global mutable session table. A room session (built on top of this
//! crate, in `catchup`) owns exactly one [`room::RoomKeyState`] and reaches
//! persistence and transport through handles passed in at construction.

pub mod cipher;
pub mod constants;
pub mod envelope;
pub mod errors;
pub mod payloads;
pub mod ratchet;
pub mod room;
pub mod signing;
pub mod validation;

pub use errors::CoreError;
pub use ratchet::Ratchet;
pub use room::RoomKeyState;
