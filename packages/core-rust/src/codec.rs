//! Byte encoding for bus payloads.
//!
//! JSON is the default. `MsgPack` uses named fields
//! (`rmp_serde::to_vec_named`) so documents stay self-describing.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encoding used for both inbound requests and outbound results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    #[default]
    Json,
    MsgPack,
}

impl WireFormat {
    /// Serialize `value` in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented in the format.
    pub fn encode<T: Serialize>(self, value: &T) -> anyhow::Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::MsgPack => Ok(rmp_serde::to_vec_named(value)?),
        }
    }

    /// Deserialize a value from bytes in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document of type `T`.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> anyhow::Result<T> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::MsgPack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MsgPack => "msgpack",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "msgpack" | "messagepack" => Ok(Self::MsgPack),
            other => Err(anyhow::anyhow!("unknown wire format: {other}")),
        }
    }
}
