//! Pluggable object codecs.
//!
//! A [`Serializer`] maps application objects (`serde_json::Value`) to payload
//! bytes and back. It knows nothing about framing.

use crate::error::SerializationError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Object ⇄ bytes codec used by clients and servers.
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    fn serialize(&self, value: &Value) -> Result<Bytes, SerializationError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, SerializationError>;
}

impl dyn Serializer {
    /// Serializes any `Serialize` type by way of a `Value`.
    pub fn serialize_as<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Bytes, SerializationError> {
        let value = serde_json::to_value(value)?;
        self.serialize(&value)
    }

    /// Deserializes payload bytes straight into a typed value.
    pub fn deserialize_as<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        let value = self.deserialize(bytes)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// UTF-8 JSON text. The default serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, SerializationError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, SerializationError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact binary MessagePack.
///
/// Maps are written with their keys, so payloads interoperate with other
/// MessagePack implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, SerializationError> {
        Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, SerializationError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Serializer selector, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerKind {
    #[default]
    Json,
    #[serde(rename = "msgpack", alias = "msg_pack", alias = "messagepack")]
    MsgPack,
}

impl SerializerKind {
    /// Instantiates the selected serializer.
    pub fn build(self) -> Arc<dyn Serializer> {
        match self {
            SerializerKind::Json => Arc::new(JsonSerializer),
            SerializerKind::MsgPack => Arc::new(MsgPackSerializer),
        }
    }
}

impl std::str::FromStr for SerializerKind {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SerializerKind::Json),
            "msgpack" | "messagepack" | "msg_pack" => Ok(SerializerKind::MsgPack),
            other => Err(SerializationError::UnknownSerializer(other.to_string())),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerKind::Json => write!(f, "json"),
            SerializerKind::MsgPack => write!(f, "msgpack"),
        }
    }
}

/// Returns the default serializer (JSON).
pub fn default_serializer() -> Arc<dyn Serializer> {
    Arc::new(JsonSerializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({"method": "pants", "params": [1, 2, 3, 4]})
    }

    #[test]
    fn test_json_roundtrip() {
        let serializer = JsonSerializer;
        let bytes = serializer.serialize(&sample()).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"method":"pants","params":[1,2,3,4]}"#
        );
        assert_eq!(serializer.deserialize(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_json_malformed() {
        let err = JsonSerializer.deserialize(b"{\"method\":").unwrap_err();
        assert!(matches!(err, SerializationError::Json(_)));
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let serializer = MsgPackSerializer;
        let bytes = serializer.serialize(&sample()).unwrap();
        // fixmap with two entries
        assert_eq!(bytes[0], 0x82);
        assert!(bytes.len() < JsonSerializer.serialize(&sample()).unwrap().len());
        assert_eq!(serializer.deserialize(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_msgpack_malformed() {
        // 0xc1 is never used in MessagePack
        let err = MsgPackSerializer.deserialize(&[0xc1]).unwrap_err();
        assert!(matches!(err, SerializationError::MsgPackDecode(_)));
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Call {
            method: String,
            params: Vec<u32>,
        }

        let call = Call {
            method: "pants".to_string(),
            params: vec![1, 2, 3, 4],
        };

        for kind in [SerializerKind::Json, SerializerKind::MsgPack] {
            let serializer = kind.build();
            let bytes = serializer.serialize_as(&call).unwrap();
            let decoded: Call = serializer.deserialize_as(&bytes).unwrap();
            assert_eq!(decoded, call);
        }
    }

    #[test]
    fn test_serializer_kind() {
        assert_eq!("JSON".parse::<SerializerKind>().unwrap(), SerializerKind::Json);
        assert_eq!(
            "msgpack".parse::<SerializerKind>().unwrap(),
            SerializerKind::MsgPack
        );
        assert!(matches!(
            "xml".parse::<SerializerKind>(),
            Err(SerializationError::UnknownSerializer(_))
        ));
        assert_eq!(SerializerKind::MsgPack.build().name(), "msgpack");
        assert_eq!(default_serializer().name(), "json");

        let kind: SerializerKind = serde_json::from_str("\"msg_pack\"").unwrap();
        assert_eq!(kind, SerializerKind::MsgPack);
        assert_eq!(SerializerKind::Json.to_string(), "json");
    }
}
