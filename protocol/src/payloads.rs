//! Concrete payload shapes for every envelope `type` in the wire enum.
//!
//! `ChatMessage` lives in [`crate::cipher`] next to the code that seals and
//! opens it; everything else is here.

use serde::{Deserialize, Serialize};

use common::{base64_bytes, PeerId};

/// A peer's announcement that it has subscribed to the room's chat topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMessage {}

/// A peer's announcement of departure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveMessage {}

/// One membership-change rekey entry: a wrapped copy of the new room key
/// for a single peer. Structurally present for interoperability; no driver
/// in this crate consumes it (asymmetric rekey on membership change is
/// stubbed upstream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekeyEntry {
    pub peer_id: PeerId,
    #[serde(with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
}

/// Rekey payload: a list of per-peer wrapped keys. The envelope codec can
/// marshal/unmarshal this; nothing acts on it yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekeyMessage {
    pub entries: Vec<RekeyEntry>,
}

/// A join-time request for the master room key, current chain index, and
/// envelope backlog. Empty but signed, so the responder can identify the
/// requester's long-term key without a separate directory lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpRequest {}

/// Responder's answer to a [`CatchUpRequest`]: the room's live chain index,
/// master key, and a gzip-framed backlog of stored envelopes. `error` is set
/// (and the rest left at defaults) when the responder cannot build a
/// payload — the response is still sent so the requester does not hang.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchUpResponse {
    pub chain_index: u64,
    #[serde(with = "base64_bytes")]
    pub master_room_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub master_room_key_base: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub catchup_messages: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatchUpResponse {
    pub fn error(message: impl Into<String>) -> Self {
        CatchUpResponse {
            chain_index: 0,
            master_room_key: Vec::new(),
            master_room_key_base: Vec::new(),
            catchup_messages: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Profile/key announcement; feeds the peer directory on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub peer_id: PeerId,
    pub username: String,
    pub preferred_color: String,
    #[serde(with = "base64_bytes")]
    pub dilithium_pub: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub kyber_pub: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub libp2p_pub: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catchup_response_error_round_trips_without_key_material() {
        let resp = CatchUpResponse::error("no auth row");
        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: CatchUpResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.error.as_deref(), Some("no auth row"));
        assert!(decoded.master_room_key.is_empty());
    }

    #[test]
    fn rekey_message_round_trips() {
        let msg = RekeyMessage {
            entries: vec![RekeyEntry {
                peer_id: PeerId::from("peer-1"),
                wrapped_key: vec![1, 2, 3],
            }],
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: RekeyMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }
}
