//! Opaque authentication state produced and consumed by messaging clients.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Serialized client auth state.
///
/// The bytes are never interpreted by sessiond. They travel as standard
/// base64 inside JSON documents, and `Debug` only reports the length so blobs
/// never end up in logs.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthBlob(Vec<u8>);

impl AuthBlob {
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Encodes the blob with the standard base64 alphabet.
	pub fn to_base64(&self) -> String {
		STANDARD.encode(&self.0)
	}

	/// Decodes a standard base64 string.
	pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
		STANDARD.decode(encoded.trim()).map(Self)
	}
}

impl fmt::Debug for AuthBlob {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "AuthBlob({} bytes)", self.0.len())
	}
}

impl From<Vec<u8>> for AuthBlob {
	fn from(bytes: Vec<u8>) -> Self {
		Self(bytes)
	}
}

impl From<&[u8]> for AuthBlob {
	fn from(bytes: &[u8]) -> Self {
		Self(bytes.to_vec())
	}
}

impl From<&str> for AuthBlob {
	fn from(text: &str) -> Self {
		Self(text.as_bytes().to_vec())
	}
}

impl Serialize for AuthBlob {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_base64())
	}
}

impl<'de> Deserialize<'de> for AuthBlob {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		Self::from_base64(&encoded).map_err(de::Error::custom)
	}
}
