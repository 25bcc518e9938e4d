//! JSON payload codec.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::CourierError;

/// Encodes and decodes UTF-8 JSON payloads.
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CourierError> {
        serde_json::to_vec(value).map_err(|e| CourierError::Encode(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CourierError> {
        serde_json::from_slice(payload).map_err(|e| CourierError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        name: String,
        count: u32,
    }

    #[test]
    fn encode_then_decode_preserves_value() {
        let probe = Probe {
            name: "hello".to_string(),
            count: 3,
        };
        let bytes = JsonCodec::encode(&probe).unwrap();
        let back: Probe = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(back, probe);
    }

    #[test]
    fn decode_rejects_non_json_bytes() {
        let err = JsonCodec::decode::<Probe>(b"not json at all").unwrap_err();
        assert!(matches!(err, CourierError::Decode(_)));
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let err = JsonCodec::decode::<Probe>(b"{\"name\":\"x\"}").unwrap_err();
        assert!(matches!(err, CourierError::Decode(_)));
    }
}
