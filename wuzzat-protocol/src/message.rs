//! Decoded application messages.

use bytes::Bytes;
use serde_json::Value;

/// One inbound application message.
///
/// Carries the decoded object together with the exact frame payload it was
/// decoded from, so handlers can forward or echo the bytes untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Raw frame payload, as produced by the peer's serializer.
    pub payload: Bytes,
    /// Payload decoded by the local serializer.
    pub value: Value,
}

impl Message {
    pub fn new(payload: Bytes, value: Value) -> Self {
        Self { payload, value }
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Converts the decoded value into a typed struct.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_parse() {
        #[derive(serde::Deserialize)]
        struct Call {
            method: String,
            params: Vec<i32>,
        }

        let msg = Message::new(
            Bytes::from_static(br#"{"method":"pants","params":[1,2]}"#),
            json!({"method": "pants", "params": [1, 2]}),
        );
        assert_eq!(msg.len(), 33);
        assert!(!msg.is_empty());

        let call: Call = msg.parse().unwrap();
        assert_eq!(call.method, "pants");
        assert_eq!(call.params, vec![1, 2]);
    }
}
