//! # Serialization Plugins
//!
//! Codecs that turn producer values into event bodies. The broker picks one
//! by name (`json` unless configured otherwise) and never inspects the bytes
//! it produces.

use serde::Serialize;
use serde_json::Value;

use crate::error::SerializationError;

/// Name of the default codec.
pub const DEFAULT_SERIALIZER: &str = "json";

/// A named codec.
pub trait Serializer: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Encode a document.
    ///
    /// # Errors
    ///
    /// `SerializationError::Encode` if the codec cannot represent `value`.
    fn dump(&self, value: &Value) -> Result<Vec<u8>, SerializationError>;
}

/// Convert any serializable value into the document handed to a codec.
///
/// # Errors
///
/// `SerializationError::Value` if `value`'s `Serialize` impl fails (for
/// example a map with non-string keys).
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Value, SerializationError> {
    serde_json::to_value(value).map_err(SerializationError::Value)
}

/// Compact JSON. The default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn dump(&self, value: &Value) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(|e| SerializationError::Encode {
            codec: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Compact binary encoding via `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn dump(&self, value: &Value) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(value).map_err(|e| SerializationError::Encode {
            codec: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
