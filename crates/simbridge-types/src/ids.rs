//! Session identifiers and protocol sequence ids.
//!
//! Both are server-assigned. The client never invents a [`SessionId`]; it
//! only starts the [`SequenceId`] at [`SequenceId::INITIAL`] and afterwards
//! echoes whatever the server returned on the previous exchange.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of a registered simulator session.
///
/// Empty until registration succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a server-assigned session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty (no session assigned yet).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Request/response pairing counter of the advance protocol.
///
/// Serialized as a JSON number. Deserialization also accepts a numeric
/// string, which some gateway versions send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SequenceId(i64);

impl SequenceId {
    /// The sequence id sent on the first advance after registration.
    pub const INITIAL: Self = Self(1);

    /// Wrap a raw sequence id.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl core::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(i64),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Number(value) => Ok(Self(value)),
            Wire::Text(text) => text
                .trim()
                .parse()
                .map(Self)
                .map_err(|e| D::Error::custom(format!("invalid sequence id {text:?}: {e}"))),
        }
    }
}
