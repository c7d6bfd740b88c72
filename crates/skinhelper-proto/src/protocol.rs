use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::media::SearchResults;

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload a peer may announce in a length header.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// More bytes are needed before the frame can be decoded.
    #[error("incomplete frame")]
    Incomplete,
    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
    /// The frame is complete but its payload is not a known message.
    /// `len` covers the header too, so the caller can skip it.
    #[error("undecodable frame: {source}")]
    Invalid {
        len: usize,
        source: serde_json::Error,
    },
}

/// Messages sent from a skin-side client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    GetProperties,
    /// Start a search session bound to this connection.
    OpenSearch,
    /// Raw key event (action id + button code) for the search session.
    SearchAction { action_id: i32, button_code: u32 },
    /// Activation of an on-screen control of the search view.
    SearchClick { control_id: i32 },
    /// Free-text answer to a `PromptText` request.
    SearchText { text: String },
    CloseSearch,
}

/// Messages sent from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: protocol version + full property snapshot.
    Hello {
        protocol_version: u32,
        rev: u64,
        properties: BTreeMap<String, String>,
    },
    Properties {
        rev: u64,
        properties: BTreeMap<String, String>,
    },
    PropertySet {
        key: String,
        value: String,
    },
    PropertyCleared {
        key: String,
    },
    SearchLabel {
        text: String,
    },
    SearchFocus {
        control_id: i32,
    },
    SearchResults {
        results: SearchResults,
    },
    /// The client should ask the user for free text and answer with `SearchText`.
    PromptText,
    /// Show the info dialog for the item selected in `control_id`.
    ShowInfo {
        control_id: i32,
    },
    SearchClosed,
    /// A WARN or ERROR line from the daemon log.
    Log {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Wrapper for socket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    pub fn decode(data: &[u8]) -> Result<(Self, usize), FrameError> {
        if data.len() < 4 {
            return Err(FrameError::Incomplete);
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(len));
        }
        if data.len() < 4 + len {
            return Err(FrameError::Incomplete);
        }
        match serde_json::from_slice(&data[4..4 + len]) {
            Ok(msg) => Ok((msg, 4 + len)),
            Err(source) => Err(FrameError::Invalid {
                len: 4 + len,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_decode() {
        let msg = Message::Command(Command::SearchClick { control_id: 3020 });
        let encoded = msg.encode().unwrap();
        let (decoded, len) = Message::decode(&encoded).unwrap();
        assert_eq!(len, encoded.len());
        match decoded {
            Message::Command(Command::SearchClick { control_id }) => assert_eq!(control_id, 3020),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let msg = Message::Broadcast(Broadcast::PropertySet {
            key: "SkinHelper.Player.studio".to_string(),
            value: "A24".to_string(),
        });
        let encoded = msg.encode().unwrap();
        assert!(matches!(
            Message::decode(&encoded[..3]),
            Err(FrameError::Incomplete)
        ));
        assert!(matches!(
            Message::decode(&encoded[..encoded.len() - 1]),
            Err(FrameError::Incomplete)
        ));

        let mut two = encoded.clone();
        two.extend_from_slice(&encoded);
        let (_, consumed) = Message::decode(&two).unwrap();
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_bad_frames() {
        let payload = br#"{"cmd":"Bogus"}"#;
        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(payload);
        match Message::decode(&frame) {
            Err(FrameError::Invalid { len, .. }) => assert_eq!(len, frame.len()),
            other => panic!("expected Invalid, got {:?}", other.map(|(_, n)| n)),
        }

        let huge = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        assert!(matches!(
            Message::decode(&huge),
            Err(FrameError::TooLarge(n)) if n == MAX_FRAME_LEN + 1
        ));
    }
}
