//! Identifier newtypes and the sender descriptor shared across every crate.
//!
//! These wrap plain strings so that a room id and a peer id can never be
//! swapped by accident at a call site, matching the opaque-identifier style
//! the rest of the workspace uses for key material.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }
    };
}

string_id!(RoomId);
string_id!(ServerId);
string_id!(PeerId);

/// Sender / member descriptor. Keys are opaque serialized blobs; nothing at
/// this layer inspects them beyond feeding them to a verify operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
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

impl User {
    /// A placeholder used when a sender is not (yet) in the peer directory.
    /// Verification must always refuse this user: it carries no usable key.
    pub fn unknown(peer_id: PeerId) -> Self {
        User {
            peer_id,
            username: "Unknown".to_string(),
            preferred_color: String::new(),
            dilithium_pub: Vec::new(),
            kyber_pub: Vec::new(),
            libp2p_pub: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.dilithium_pub.is_empty()
    }
}

/// (De)serialize a byte buffer as standard-padded base64, matching the wire
/// format fixed in the external interfaces section of the spec.
pub mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        general_purpose::STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_round_trips_through_json() {
        let user = User {
            peer_id: PeerId::from("peer-1"),
            username: "alice".to_string(),
            preferred_color: "cyan".to_string(),
            dilithium_pub: vec![1, 2, 3],
            kyber_pub: vec![4, 5, 6],
            libp2p_pub: vec![7, 8, 9],
        };
        let encoded = serde_json::to_string(&user).unwrap();
        let decoded: User = serde_json::from_str(&encoded).unwrap();
        assert_eq!(user, decoded);
    }

    #[test]
    fn unknown_user_is_flagged() {
        let user = User::unknown(PeerId::from("ghost"));
        assert!(user.is_unknown());
    }
}
