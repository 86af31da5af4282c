//! Two-tier value encoding for cached payloads
//!
//! Structured values are written as JSON. Opaque values are written with
//! bincode inside a small envelope tagged by a magic number. Plain text is
//! written as raw UTF-8.
//!
//! Reading tries, in order: JSON, the bincode envelope, raw bytes as text.
//! Every value ever written through either path stays readable.

use crate::error::OrchestrationError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Little-endian bytes start with 0xB1, which can open neither JSON nor UTF-8 text
const OPAQUE_MAGIC: u32 = 0xCAC4_E0B1;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Maps/lists of primitives, stored losslessly as JSON
    Structured(serde_json::Value),
    /// Arbitrary bincode-encoded payload
    Opaque(Vec<u8>),
    /// Raw text
    Text(String),
}

#[derive(Serialize, Deserialize)]
struct OpaqueEnvelope {
    magic: u32,
    payload: Vec<u8>,
}

impl CacheValue {
    pub fn structured<T: Serialize>(value: &T) -> Result<Self> {
        Ok(CacheValue::Structured(serde_json::to_value(value)?))
    }

    pub fn opaque<T: Serialize>(value: &T) -> Result<Self> {
        Ok(CacheValue::Opaque(bincode::serialize(value)?))
    }

    pub fn text(value: impl Into<String>) -> Self {
        CacheValue::Text(value.into())
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CacheValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Decode into a concrete type through whichever tier the value came from
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            CacheValue::Structured(value) => Ok(serde_json::from_value(value)?),
            CacheValue::Opaque(bytes) => Ok(bincode::deserialize(&bytes)?),
            CacheValue::Text(text) => serde_json::from_str(&text).map_err(|e| {
                OrchestrationError::Cache(format!("cached text is not a typed payload: {}", e))
            }),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            CacheValue::Structured(value) => Ok(serde_json::to_vec(value)?),
            CacheValue::Opaque(payload) => Ok(bincode::serialize(&OpaqueEnvelope {
                magic: OPAQUE_MAGIC,
                payload: payload.clone(),
            })?),
            CacheValue::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Structured first, then opaque, then raw bytes as (lossy) text
    pub fn decode(bytes: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
            return CacheValue::Structured(value);
        }

        if let Ok(envelope) = bincode::deserialize::<OpaqueEnvelope>(bytes) {
            if envelope.magic == OPAQUE_MAGIC {
                return CacheValue::Opaque(envelope.payload);
            }
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => CacheValue::Text(text.to_string()),
            Err(_) => CacheValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        price: f64,
        levels: Vec<u32>,
    }

    #[test]
    fn test_structured_round_trip() {
        let value = json!({"outlook": "bullish", "factors": ["a", "b"], "confidence": 0.8});
        let bytes = CacheValue::Structured(value.clone()).encode().unwrap();
        assert_eq!(CacheValue::decode(&bytes), CacheValue::Structured(value));
    }

    #[test]
    fn test_opaque_payload_survives_fallback() {
        let quote = Quote {
            symbol: "BTC".to_string(),
            price: 64_000.5,
            levels: vec![60_000, 70_000],
        };
        let bytes = CacheValue::opaque(&quote).unwrap().encode().unwrap();

        let decoded = CacheValue::decode(&bytes);
        assert!(matches!(decoded, CacheValue::Opaque(_)));
        assert_eq!(decoded.into_typed::<Quote>().unwrap(), quote);
    }

    #[test]
    fn test_plain_text_falls_through_to_text() {
        let bytes = CacheValue::text("just a note").encode().unwrap();
        assert_eq!(CacheValue::decode(&bytes), CacheValue::Text("just a note".to_string()));
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let decoded = CacheValue::decode(&[0x66, 0x6f, 0xff, 0x6f]);
        assert_eq!(decoded.as_text(), Some("fo\u{fffd}o"));
    }

    #[test]
    fn test_bincode_without_magic_is_not_opaque() {
        let envelope = OpaqueEnvelope {
            magic: 7,
            payload: vec![1, 2, 3],
        };
        let bytes = bincode::serialize(&envelope).unwrap();
        assert!(matches!(CacheValue::decode(&bytes), CacheValue::Text(_)));
    }

    #[test]
    fn test_structured_into_typed() {
        let value = CacheValue::structured(&Quote {
            symbol: "ETH".to_string(),
            price: 3100.0,
            levels: vec![],
        })
        .unwrap();
        let quote: Quote = value.into_typed().unwrap();
        assert_eq!(quote.symbol, "ETH");
    }
}
