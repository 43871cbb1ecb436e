//! Opaque JSON payload carried for model state, episode configs and actions.
//!
//! The session protocol never interprets these values. The embedding model
//! encodes its own state into a [`Payload`] and decodes configs and actions
//! out of one according to its own schema.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque, schema-free JSON value owned by the simulation model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// The empty payload (`null`).
    pub const fn null() -> Self {
        Self(Value::Null)
    }

    /// Encode any serializable value as a payload.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self)
    }

    /// Decode the payload into the model's own type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// Borrow the underlying JSON value.
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the payload and return the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Whether the payload is `null`.
    pub const fn is_null(&self) -> bool {
        matches!(self.0, Value::Null)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.0
    }
}

impl core::fmt::Display for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
