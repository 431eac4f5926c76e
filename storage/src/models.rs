//! Row types for the three tables this crate owns: `messages`, `peers`,
//! `room_auth`.

use common::{PeerId, RoomId, ServerId, User};

/// One persisted envelope. `chain_index` is `None` for envelope types that
/// don't carry a ratchet step (join/leave/rekey/catchup/user_update); when
/// present, `(room_id, chain_index)` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub room_id: RoomId,
    pub server_id: ServerId,
    pub chain_index: Option<u64>,
    pub envelope_type: String,
    pub sender_id: PeerId,
    pub timestamp_micros: i64,
    pub signature: Vec<u8>,
    pub payload: Vec<u8>,
}

/// A row to insert — everything but the auto-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub server_id: ServerId,
    pub chain_index: Option<u64>,
    pub envelope_type: String,
    pub sender_id: PeerId,
    pub timestamp_micros: i64,
    pub signature: Vec<u8>,
    pub payload: Vec<u8>,
}

/// One row per room: the live ratchet snapshot a session needs to resume
/// without catch-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAuthRow {
    pub room_id: RoomId,
    pub chain_index: u64,
    pub master_ratchet_key: Vec<u8>,
    pub last_used_micros: i64,
    pub tombstone: bool,
    pub synced: bool,
}

/// A cached peer directory entry, convertible to [`User`] for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    pub peer_id: PeerId,
    pub dilithium_pub: Vec<u8>,
    pub kyber_pub: Vec<u8>,
    pub libp2p_pub: Vec<u8>,
    pub username: String,
    pub preferred_color: String,
    pub last_seen_micros: i64,
}

impl From<PeerRow> for User {
    fn from(row: PeerRow) -> Self {
        User {
            peer_id: row.peer_id,
            username: row.username,
            preferred_color: row.preferred_color,
            dilithium_pub: row.dilithium_pub,
            kyber_pub: row.kyber_pub,
            libp2p_pub: row.libp2p_pub,
        }
    }
}
