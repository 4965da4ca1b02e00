//! Message payloads and their JSON encoding.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// A message or setting value.
///
/// Inbound bytes are decoded as JSON when possible; anything else is kept
/// verbatim, so callers can tell which path was taken.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// Payload that parsed as JSON
	Structured(serde_json::Value),
	/// Payload kept as received
	Raw(Bytes),
}

impl Payload {
	/// Decodes bytes, preferring JSON and falling back to raw bytes.
	pub fn decode(bytes: impl Into<Bytes>) -> Self {
		let bytes = bytes.into();
		match serde_json::from_slice(&bytes) {
			| Ok(value) => Payload::Structured(value),
			| Err(_) => Payload::Raw(bytes),
		}
	}

	/// Serializes `value` into a structured payload.
	pub fn from_json<T: Serialize + ?Sized>(
		value: &T,
	) -> Result<Self, serde_json::Error> {
		serde_json::to_value(value).map(Payload::Structured)
	}

	/// Encodes the payload for transmission. Structured values are written
	/// as canonical JSON text, raw bytes are passed through.
	pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
		match self {
			| Payload::Structured(value) => {
				serde_json::to_vec(value).map(Bytes::from)
			}
			| Payload::Raw(bytes) => Ok(bytes.clone()),
		}
	}

	/// Deserializes the payload into `T`.
	pub fn deserialize<T: DeserializeOwned>(
		&self,
	) -> Result<T, serde_json::Error> {
		match self {
			| Payload::Structured(value) => serde_json::from_value(value.clone()),
			| Payload::Raw(bytes) => serde_json::from_slice(bytes),
		}
	}

	/// Returns the JSON value if the payload is structured.
	pub fn as_structured(&self) -> Option<&serde_json::Value> {
		match self {
			| Payload::Structured(value) => Some(value),
			| Payload::Raw(_) => None,
		}
	}

	/// Returns a text view: JSON strings and UTF-8 raw payloads.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			| Payload::Structured(serde_json::Value::String(s)) => Some(s),
			| Payload::Structured(_) => None,
			| Payload::Raw(bytes) => std::str::from_utf8(bytes).ok(),
		}
	}

	/// True if the payload decoded as JSON.
	pub fn is_structured(&self) -> bool {
		matches!(self, Payload::Structured(_))
	}
}

impl From<serde_json::Value> for Payload {
	fn from(value: serde_json::Value) -> Self {
		Payload::Structured(value)
	}
}

impl From<Bytes> for Payload {
	fn from(bytes: Bytes) -> Self {
		Payload::Raw(bytes)
	}
}

impl From<Vec<u8>> for Payload {
	fn from(bytes: Vec<u8>) -> Self {
		Payload::Raw(Bytes::from(bytes))
	}
}

impl From<&'static [u8]> for Payload {
	fn from(bytes: &'static [u8]) -> Self {
		Payload::Raw(Bytes::from_static(bytes))
	}
}

impl From<String> for Payload {
	fn from(text: String) -> Self {
		Payload::Raw(Bytes::from(text))
	}
}

impl From<&str> for Payload {
	fn from(text: &str) -> Self {
		Payload::Raw(Bytes::copy_from_slice(text.as_bytes()))
	}
}
