use rmpv::Value;
use serde::{Serialize, de::DeserializeOwned};

use super::{ProtocolError, Route};

/// Deepest value nesting accepted from the wire. Frames are shallow; the
/// bound keeps hostile input from exhausting the stack while decoding.
const MAX_DEPTH: usize = 32;

/// One RPC message: a method name followed by positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    method: String,
    args: Vec<Value>,
}

impl Frame {
    /// Creates a frame from already-built argument values.
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Creates a frame carrying a single serializable payload.
    ///
    /// Structs are encoded as maps keyed by their serialized field names.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the payload cannot be serialized.
    pub fn event<T: Serialize>(
        method: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let method = method.into();
        let encode_error = |details: String| ProtocolError::Encode {
            method: method.clone(),
            details,
        };

        let bytes = rmp_serde::to_vec_named(payload).map_err(|e| encode_error(e.to_string()))?;
        let value = rmpv::decode::read_value(&mut bytes.as_slice())
            .map_err(|e| encode_error(e.to_string()))?;

        Ok(Self {
            method,
            args: vec![value],
        })
    }

    /// Full method string as sent on the wire.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Positional arguments after the method.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Routing decision for this frame's method.
    pub fn route(&self) -> Route {
        Route::parse(&self.method)
    }

    /// Deserializes the argument at `position`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MissingArgument`] when there are not enough
    /// arguments and [`ProtocolError::InvalidPayload`] when the value has the
    /// wrong shape.
    pub fn arg<T: DeserializeOwned>(&self, position: usize) -> Result<T, ProtocolError> {
        let value = self
            .args
            .get(position)
            .ok_or_else(|| ProtocolError::MissingArgument {
                method: self.method.clone(),
                position,
            })?;

        rmpv::ext::from_value(value.clone()).map_err(|e| ProtocolError::InvalidPayload {
            method: self.method.clone(),
            details: e.to_string(),
        })
    }

    /// Serializes the frame as `[method, ...args]`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if writing the value fails.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        items.push(Value::from(self.method.as_str()));
        items.extend(self.args.iter().cloned());

        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Value::Array(items)).map_err(|e| {
            ProtocolError::Encode {
                method: self.method.clone(),
                details: e.to_string(),
            }
        })?;

        Ok(buf)
    }

    /// Parses a frame from raw bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] unless the bytes hold a non-empty
    /// MessagePack array whose first element is a UTF-8 string.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = bytes;
        let value = rmpv::decode::read_value_with_max_depth(&mut cursor, MAX_DEPTH)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "expected an array, got {other}"
                )));
            }
        };

        let mut items = items.into_iter();
        let method = match items.next() {
            Some(Value::String(method)) => method
                .into_str()
                .ok_or_else(|| ProtocolError::Malformed("method is not valid UTF-8".to_string()))?,
            Some(other) => {
                return Err(ProtocolError::Malformed(format!(
                    "method must be a string, got {other}"
                )));
            }
            None => return Err(ProtocolError::Malformed("empty frame".to_string())),
        };

        Ok(Self {
            method,
            args: items.collect(),
        })
    }
}
