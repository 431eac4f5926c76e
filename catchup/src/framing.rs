//! Inner framing of `CatchUpResponse.catchup_messages`: a gzip stream of
//! repeated `[len: 8 bytes big-endian][json StoredMessage]` frames (spec
//! §6), used to move a room's envelope backlog in one message.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use protocol::CoreError;
use storage::StoredMessage;

/// One frame as it appears inside the gzip stream, independent of the
/// `messages` table's auto-assigned row id (which has no meaning across
/// peers).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct FramedMessage {
    room_id: String,
    server_id: String,
    chain_index: Option<u64>,
    envelope_type: String,
    sender_id: String,
    timestamp_micros: i64,
    #[serde(with = "common::base64_bytes")]
    signature: Vec<u8>,
    #[serde(with = "common::base64_bytes")]
    payload: Vec<u8>,
}

impl From<&StoredMessage> for FramedMessage {
    fn from(m: &StoredMessage) -> Self {
        FramedMessage {
            room_id: m.room_id.as_str().to_string(),
            server_id: m.server_id.as_str().to_string(),
            chain_index: m.chain_index,
            envelope_type: m.envelope_type.clone(),
            sender_id: m.sender_id.as_str().to_string(),
            timestamp_micros: m.timestamp_micros,
            signature: m.signature.clone(),
            payload: m.payload.clone(),
        }
    }
}

/// Encode `messages` as a gzip stream of length-prefixed JSON frames.
pub fn encode(messages: &[StoredMessage]) -> Result<Vec<u8>, CoreError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for message in messages {
        let framed = FramedMessage::from(message);
        let json = serde_json::to_vec(&framed)?;
        encoder
            .write_all(&(json.len() as u64).to_be_bytes())
            .map_err(|e| CoreError::protocol(format!("catchup frame write failed: {}", e)))?;
        encoder
            .write_all(&json)
            .map_err(|e| CoreError::protocol(format!("catchup frame write failed: {}", e)))?;
    }
    encoder
        .finish()
        .map_err(|e| CoreError::protocol(format!("gzip finalize failed: {}", e)))
}

/// One entry decoded from a catch-up stream, identifying a stored envelope
/// without the receiver's local row id (it is assigned fresh on persist).
pub struct DecodedEntry {
    pub room_id: common::RoomId,
    pub server_id: common::ServerId,
    pub chain_index: Option<u64>,
    pub envelope_type: String,
    pub sender_id: common::PeerId,
    pub timestamp_micros: i64,
    pub signature: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Decode a gzip stream of length-prefixed JSON frames back into entries,
/// in the order they were encoded.
pub fn decode(stream: &[u8]) -> Result<Vec<DecodedEntry>, CoreError> {
    let mut decoder = GzDecoder::new(stream);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| CoreError::protocol(format!("gzip decode failed: {}", e)))?;

    let mut entries = Vec::new();
    let mut cursor = 0usize;
    while cursor < raw.len() {
        if cursor + 8 > raw.len() {
            return Err(CoreError::protocol("truncated catchup frame length"));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&raw[cursor..cursor + 8]);
        let len = u64::from_be_bytes(len_bytes) as usize;
        cursor += 8;

        if cursor + len > raw.len() {
            return Err(CoreError::protocol("truncated catchup frame body"));
        }
        let framed: FramedMessage = serde_json::from_slice(&raw[cursor..cursor + len])?;
        cursor += len;

        entries.push(DecodedEntry {
            room_id: common::RoomId::from(framed.room_id),
            server_id: common::ServerId::from(framed.server_id),
            chain_index: framed.chain_index,
            envelope_type: framed.envelope_type,
            sender_id: common::PeerId::from(framed.sender_id),
            timestamp_micros: framed.timestamp_micros,
            signature: framed.signature,
            payload: framed.payload,
        });
    }
    Ok(entries)
}
