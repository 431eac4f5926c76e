//! Signed, typed envelope framing.
//!
//! Wire shape (field order is load-bearing, see the external interfaces
//! doc): `{type, sender, timestamp, signature, payload}`. `signature` is a
//! base64 string covering exactly the bytes that appear in the `payload`
//! field — not a re-serialization of it. We hold onto those exact bytes
//! (via [`serde_json::value::RawValue`]) from the moment an envelope is
//! parsed off the wire through to verification, so a sender's particular
//! whitespace/ordering choices never matter: whatever bytes arrived are
//! exactly what gets hashed.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use common::User;

use crate::cipher::ChatMessage;
use crate::errors::CoreError;
use crate::payloads::{
    CatchUpRequest, CatchUpResponse, JoinMessage, LeaveMessage, RekeyMessage, UserUpdate,
};
use crate::signing;

/// The envelope `type` tag. Dispatch is an exhaustive match over a closed
/// set of known tags plus a distinct `Unknown` value — there is no runtime
/// panic path for an unrecognized tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeType {
    Chat,
    Join,
    Leave,
    Rekey,
    CatchUpRequest,
    CatchUpResponse,
    UserUpdate,
    Unknown(String),
}

impl EnvelopeType {
    pub fn as_wire_str(&self) -> &str {
        match self {
            EnvelopeType::Chat => "chat",
            EnvelopeType::Join => "join",
            EnvelopeType::Leave => "leave",
            EnvelopeType::Rekey => "rekey",
            EnvelopeType::CatchUpRequest => "catchup_req",
            EnvelopeType::CatchUpResponse => "catchup_resp",
            EnvelopeType::UserUpdate => "user_update",
            EnvelopeType::Unknown(tag) => tag,
        }
    }

    pub fn from_wire_str(tag: &str) -> EnvelopeType {
        match tag {
            "chat" => EnvelopeType::Chat,
            "join" => EnvelopeType::Join,
            "leave" => EnvelopeType::Leave,
            "rekey" => EnvelopeType::Rekey,
            "catchup_req" => EnvelopeType::CatchUpRequest,
            "catchup_resp" => EnvelopeType::CatchUpResponse,
            "user_update" => EnvelopeType::UserUpdate,
            other => EnvelopeType::Unknown(other.to_string()),
        }
    }
}

impl Serialize for EnvelopeType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for EnvelopeType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EnvelopeType::from_wire_str(&s))
    }
}

/// A payload ready to be marshaled into an envelope. One variant per wire
/// `type`; `Unknown` is never constructed by this crate, only produced by
/// [`Envelope::decode_payload`] for tags this crate does not recognize.
pub enum Payload {
    Chat(ChatMessage),
    Join(JoinMessage),
    Leave(LeaveMessage),
    Rekey(RekeyMessage),
    CatchUpRequest(CatchUpRequest),
    CatchUpResponse(CatchUpResponse),
    UserUpdate(UserUpdate),
}

impl Payload {
    fn envelope_type(&self) -> EnvelopeType {
        match self {
            Payload::Chat(_) => EnvelopeType::Chat,
            Payload::Join(_) => EnvelopeType::Join,
            Payload::Leave(_) => EnvelopeType::Leave,
            Payload::Rekey(_) => EnvelopeType::Rekey,
            Payload::CatchUpRequest(_) => EnvelopeType::CatchUpRequest,
            Payload::CatchUpResponse(_) => EnvelopeType::CatchUpResponse,
            Payload::UserUpdate(_) => EnvelopeType::UserUpdate,
        }
    }

    fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let bytes = match self {
            Payload::Chat(p) => serde_json::to_vec(p)?,
            Payload::Join(p) => serde_json::to_vec(p)?,
            Payload::Leave(p) => serde_json::to_vec(p)?,
            Payload::Rekey(p) => serde_json::to_vec(p)?,
            Payload::CatchUpRequest(p) => serde_json::to_vec(p)?,
            Payload::CatchUpResponse(p) => serde_json::to_vec(p)?,
            Payload::UserUpdate(p) => serde_json::to_vec(p)?,
        };
        Ok(bytes)
    }
}

/// The wire shape, field order exactly as specified. `payload` is a raw
/// JSON value so it round-trips byte-for-byte.
#[derive(Serialize, Deserialize)]
struct WireEnvelope<'a> {
    #[serde(rename = "type")]
    ty: EnvelopeType,
    sender: std::borrow::Cow<'a, User>,
    timestamp: i64,
    #[serde(with = "common::base64_bytes")]
    signature: Vec<u8>,
    payload: Box<RawValue>,
}

/// A parsed envelope: outer fields plus the exact payload bytes as they
/// appeared on the wire. Call [`Envelope::decode_payload`] to parse those
/// bytes into a concrete [`Payload`], and [`Envelope::verify_signature`] to
/// check `signature` against them.
pub struct Envelope {
    pub envelope_type: EnvelopeType,
    pub sender: User,
    pub timestamp_micros: i64,
    pub signature: Vec<u8>,
    pub payload_bytes: Vec<u8>,
}

impl Envelope {
    /// Serialize `payload` to its canonical bytes, sign those bytes with
    /// `secret_key`, and produce the complete wire-format envelope.
    pub fn marshal(
        payload: &Payload,
        sender: User,
        secret_key: &[u8],
        timestamp_micros: i64,
    ) -> Result<Vec<u8>, CoreError> {
        let payload_bytes = payload.to_json_bytes()?;
        let signature = signing::sign(secret_key, &payload_bytes)?;
        let raw = RawValue::from_string(
            String::from_utf8(payload_bytes)
                .map_err(|e| CoreError::validation(format!("payload not valid utf-8: {}", e)))?,
        )
        .map_err(CoreError::from)?;

        let wire = WireEnvelope {
            ty: payload.envelope_type(),
            sender: std::borrow::Cow::Owned(sender),
            timestamp: timestamp_micros,
            signature,
            payload: raw,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    /// Parse the outer envelope. Dispatch on `type` happens later, in
    /// [`Envelope::decode_payload`] — an unrecognized tag does not fail
    /// here, it becomes [`EnvelopeType::Unknown`].
    pub fn decode(bytes: &[u8]) -> Result<Envelope, CoreError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        Ok(Envelope {
            envelope_type: wire.ty,
            sender: wire.sender.into_owned(),
            timestamp_micros: wire.timestamp,
            signature: wire.signature,
            payload_bytes: wire.payload.get().as_bytes().to_vec(),
        })
    }

    /// Verify `signature` against the exact payload bytes this envelope
    /// carries, using the sender's long-term Dilithium public key.
    pub fn verify_signature(&self) -> bool {
        signing::verify(&self.sender.dilithium_pub, &self.payload_bytes, &self.signature)
    }

    /// Parse `payload_bytes` into the concrete payload matching
    /// `envelope_type`. Fails with [`CoreError::Protocol`] (`UnknownType`)
    /// for an envelope whose type this crate does not recognize.
    pub fn decode_payload(&self) -> Result<Payload, CoreError> {
        match &self.envelope_type {
            EnvelopeType::Chat => Ok(Payload::Chat(serde_json::from_slice(&self.payload_bytes)?)),
            EnvelopeType::Join => Ok(Payload::Join(serde_json::from_slice(&self.payload_bytes)?)),
            EnvelopeType::Leave => Ok(Payload::Leave(serde_json::from_slice(&self.payload_bytes)?)),
            EnvelopeType::Rekey => Ok(Payload::Rekey(serde_json::from_slice(&self.payload_bytes)?)),
            EnvelopeType::CatchUpRequest => {
                Ok(Payload::CatchUpRequest(serde_json::from_slice(&self.payload_bytes)?))
            }
            EnvelopeType::CatchUpResponse => {
                Ok(Payload::CatchUpResponse(serde_json::from_slice(&self.payload_bytes)?))
            }
            EnvelopeType::UserUpdate => {
                Ok(Payload::UserUpdate(serde_json::from_slice(&self.payload_bytes)?))
            }
            EnvelopeType::Unknown(tag) => {
                Err(CoreError::protocol(format!("UnknownType: {}", tag)))
            }
        }
    }
}
