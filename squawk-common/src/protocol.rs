//! Protocol definitions for Squawk client-server communication
//!
//! All messages are JSON objects tagged with a `type` field and sent as
//! newline-delimited lines over TCP (see [`crate::io`]). Audio payloads
//! travel as base64 strings inside the JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serde adapter for audio payloads: `Vec<u8>` in memory, base64 on the wire.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

// ============================================================================
// Client Messages (client → server)
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Announce the session identity; sent first on every connection.
    ///
    /// The server echoes `client_id` back as `sender_id` when fanning out
    /// audio, which is how clients recognize and discard their own clips.
    Hello { client_id: Uuid },
    /// Subscribe to a channel's audio
    JoinChannel { channel: String },
    /// Unsubscribe from a channel
    LeaveChannel { channel: String },
    /// Broadcast one finished voice clip to a channel's listeners
    AudioMessage {
        channel: String,
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
    },
}

// ============================================================================
// Server Messages (server → client)
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A voice clip from another member of a channel
    AudioMessage {
        channel: String,
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
        sender_id: Uuid,
    },
}
