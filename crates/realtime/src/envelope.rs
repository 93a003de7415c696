use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Typed frame carried over the live stream.
///
/// On the wire this is `{ "type": "...", "payload": ... }`; `pong` and `ping` carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Envelope {
	Message(Message),
	System(String),
	Pong,
	Ping,
}

impl Envelope {
	/// Parses one text frame. Callers drop frames that fail here, the error is never surfaced.
	pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(frame)
	}

	#[must_use]
	pub fn encode(&self) -> String {
		// Serializing this enum cannot fail: every variant is plain data with string keys.
		serde_json::to_string(self).unwrap_or_default()
	}
}
