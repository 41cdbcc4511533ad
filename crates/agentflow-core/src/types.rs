//! Core value types shared across the engine.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A JSON payload moving through the engine
///
/// Request parameters, inbound duplex events, and result data are all
/// carried as payloads. The engine never interprets the shape; activities
/// inside the external process engine do.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Payload {
    /// The inner JSON value
    pub value: serde_json::Value,
}

impl Payload {
    /// Create a payload from a JSON value
    #[inline]
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Create a null payload
    #[inline]
    pub fn null() -> Self {
        Self {
            value: serde_json::Value::Null,
        }
    }

    /// Borrow the inner JSON value
    #[inline]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Take ownership of the inner JSON value
    #[inline]
    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Check whether the payload is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Try to view the payload as a string
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Try to view the payload as an object
    #[inline]
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.as_object()
    }

    /// Deserialize the payload into a concrete type
    pub fn to<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.value.clone())
    }

    /// Build a payload from any serializable value
    pub fn from_serialize<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Build a single-field object payload
    pub fn singleton(key: &str, value: serde_json::Value) -> Self {
        let mut map = serde_json::Map::new();
        map.insert(key.to_string(), value);
        Self::new(serde_json::Value::Object(map))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

impl From<Payload> for serde_json::Value {
    fn from(payload: Payload) -> Self {
        payload.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_roundtrip() {
        let payload = Payload::new(json!({"q": "2+2"}));
        assert_eq!(payload.as_value()["q"], "2+2");

        let serialized = serde_json::to_string(&payload).unwrap();
        assert_eq!(serialized, r#"{"q":"2+2"}"#);

        let back: Payload = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_null() {
        let payload = Payload::null();
        assert!(payload.is_null());
        assert!(payload.as_object().is_none());
    }

    #[test]
    fn test_payload_singleton() {
        let payload = Payload::singleton("answer", json!("ok"));
        let obj = payload.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get("answer").unwrap(), "ok");
    }

    #[test]
    fn test_payload_to() {
        #[derive(Deserialize)]
        struct Params {
            q: String,
        }

        let payload = Payload::new(json!({"q": "2+2"}));
        let params: Params = payload.to().unwrap();
        assert_eq!(params.q, "2+2");
    }
}
