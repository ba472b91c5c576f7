use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::CodecError;

/// Encodes function arguments and results to the opaque bytes carried by a job.
///
/// The coordinator never inspects these bytes; only the caller-facing wrapper and the
/// worker-side executor agree on a codec, identified by [`PayloadCodec::name`].
pub trait PayloadCodec: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// JSON codec; empty input decodes to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub const NAME: &'static str = "json";
}

impl PayloadCodec for JsonCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Encode any serializable value through `codec`.
pub fn encode_as<T: Serialize + ?Sized>(
    codec: &dyn PayloadCodec,
    value: &T,
) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    codec.encode(&value)
}

/// Decode bytes produced by `codec` into a typed value.
pub fn decode_as<T: DeserializeOwned>(
    codec: &dyn PayloadCodec,
    bytes: &[u8],
) -> Result<T, CodecError> {
    let value = codec.decode(bytes)?;
    serde_json::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        status: String,
        rows: u64,
    }

    #[test]
    fn typed_values_survive_the_codec() {
        let report = Report {
            status: "success".into(),
            rows: 10_000,
        };
        let bytes = encode_as(&JsonCodec, &report).unwrap();
        let back: Report = decode_as(&JsonCodec, &bytes).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn empty_bytes_decode_to_null() {
        assert_eq!(JsonCodec.decode(&[]).unwrap(), Value::Null);
        let unit: () = decode_as(&JsonCodec, &[]).unwrap();
        assert_eq!(unit, ());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = JsonCodec.decode(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
