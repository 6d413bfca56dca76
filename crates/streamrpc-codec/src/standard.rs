//! The standard codec table.
//!
//! Registration order matters: the generator codec runs first so live
//! streams are never mistaken for aggregates, then the structural
//! aggregates, then the byte-exact primitives. Anything left over
//! (null, bool, deeply mixed JSON) lands on the fallback.

use std::collections::BTreeMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::{
    ChunkSink, ChunkSource, Codec, GeneratorCodec, Key, Layout, PrimitiveCodec, StructuralBuilder,
    StructuralCodec, StructuralParts,
};
use crate::error::{CodecError, Result};
use crate::registry::CodecRegistry;
use crate::value::{ByteStream, Value};

impl CodecRegistry {
    /// The standard codec table: streams, arrays, objects, sets,
    /// strings, numbers and byte buffers, with the JSON fallback.
    pub fn standard() -> Self {
        CodecRegistry::new(vec![
            Codec::Generator(Box::new(StreamCodec)),
            Codec::Structural(Box::new(ArrayCodec)),
            Codec::Structural(Box::new(ObjectCodec)),
            Codec::Structural(Box::new(SetCodec)),
            Codec::Primitive(Box::new(StringCodec)),
            Codec::Primitive(Box::new(NumberCodec)),
            Codec::Primitive(Box::new(BytesCodec)),
        ])
    }
}

/// Generator codec for [`ByteStream`] values.
pub struct StreamCodec;

impl GeneratorCodec for StreamCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Stream(_))
    }

    fn encode(&self, value: Value) -> Result<ChunkSource> {
        match value {
            Value::Stream(stream) => Ok(Box::pin(stream)),
            _ => Err(CodecError::Unsupported("stream codec on non-stream value")),
        }
    }

    fn decode(&self) -> (Value, Box<dyn ChunkSink>) {
        let (tx, stream) = ByteStream::channel();
        (Value::Stream(stream), Box::new(ChannelSink { tx: Some(tx) }))
    }
}

struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
}

impl ChunkSink for ChannelSink {
    fn push(&mut self, chunk: Bytes) -> Result<()> {
        // The consumer may have dropped its placeholder; discarding is
        // not a protocol violation.
        if let Some(tx) = &self.tx {
            let _ = tx.send(chunk);
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.tx = None;
    }
}

/// Structural codec for index-keyed aggregates.
pub struct ArrayCodec;

impl StructuralCodec for ArrayCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Array(_))
    }

    fn encode(&self, value: Value) -> Result<StructuralParts> {
        match value {
            Value::Array(items) => Ok(StructuralParts {
                layout: Layout::Count(items.len() as u64),
                values: items,
            }),
            _ => Err(CodecError::Unsupported("array codec on non-array value")),
        }
    }

    fn decode(&self) -> Box<dyn StructuralBuilder> {
        Box::new(ArrayBuilder { items: Vec::new() })
    }
}

struct ArrayBuilder {
    items: Vec<Value>,
}

impl StructuralBuilder for ArrayBuilder {
    fn set(&mut self, value: Value, _key: Key<'_>) {
        // Sub-values arrive in declaration order.
        self.items.push(value);
    }

    fn finish(self: Box<Self>) -> Value {
        Value::Array(self.items)
    }
}

/// Structural codec for name-keyed aggregates.
pub struct ObjectCodec;

impl StructuralCodec for ObjectCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Object(_))
    }

    fn encode(&self, value: Value) -> Result<StructuralParts> {
        match value {
            Value::Object(entries) => {
                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (key, sub) in entries {
                    keys.push(key);
                    values.push(sub);
                }
                Ok(StructuralParts {
                    layout: Layout::Keys(keys),
                    values,
                })
            }
            _ => Err(CodecError::Unsupported("object codec on non-object value")),
        }
    }

    fn decode(&self) -> Box<dyn StructuralBuilder> {
        Box::new(ObjectBuilder {
            entries: BTreeMap::new(),
        })
    }
}

struct ObjectBuilder {
    entries: BTreeMap<String, Value>,
}

impl StructuralBuilder for ObjectBuilder {
    fn set(&mut self, value: Value, key: Key<'_>) {
        let name = match key {
            Key::Name(name) => name.to_string(),
            Key::Index(index) => index.to_string(),
        };
        self.entries.insert(name, value);
    }

    fn finish(self: Box<Self>) -> Value {
        Value::Object(self.entries)
    }
}

/// Structural codec for set-like aggregates. Elements ride under a
/// count layout in insertion order, exactly like arrays; only the
/// rebuilt variant differs.
pub struct SetCodec;

impl StructuralCodec for SetCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Set(_))
    }

    fn encode(&self, value: Value) -> Result<StructuralParts> {
        match value {
            Value::Set(items) => Ok(StructuralParts {
                layout: Layout::Count(items.len() as u64),
                values: items,
            }),
            _ => Err(CodecError::Unsupported("set codec on non-set value")),
        }
    }

    fn decode(&self) -> Box<dyn StructuralBuilder> {
        Box::new(SetBuilder { items: Vec::new() })
    }
}

struct SetBuilder {
    items: Vec<Value>,
}

impl StructuralBuilder for SetBuilder {
    fn set(&mut self, value: Value, _key: Key<'_>) {
        self.items.push(value);
    }

    fn finish(self: Box<Self>) -> Value {
        Value::Set(self.items)
    }
}

/// Byte buffers travel as-is.
pub struct BytesCodec;

impl PrimitiveCodec for BytesCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn encode(&self, value: Value) -> Result<Bytes> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(CodecError::Unsupported("bytes codec on non-bytes value")),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(Bytes::copy_from_slice(bytes)))
    }
}

/// Strings travel as UTF-8.
pub struct StringCodec;

impl PrimitiveCodec for StringCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::String(_))
    }

    fn encode(&self, value: Value) -> Result<Bytes> {
        match value {
            Value::String(s) => Ok(Bytes::from(s.into_bytes())),
            _ => Err(CodecError::Unsupported("string codec on non-string value")),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let s = std::str::from_utf8(bytes)?;
        Ok(Value::String(s.to_string()))
    }
}

/// Numbers travel as 8-byte big-endian IEEE 754 doubles.
pub struct NumberCodec;

impl PrimitiveCodec for NumberCodec {
    fn test(&self, value: &Value) -> bool {
        matches!(value, Value::Number(_))
    }

    fn encode(&self, value: Value) -> Result<Bytes> {
        match value {
            Value::Number(n) => Ok(Bytes::copy_from_slice(&n.to_be_bytes())),
            _ => Err(CodecError::Unsupported("number codec on non-number value")),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| CodecError::Truncated)?;
        Ok(Value::Number(f64::from_be_bytes(raw)))
    }
}

/// The universal fallback: UTF-8 JSON text of the value.
///
/// Matches everything, which guarantees value resolution always
/// succeeds. Values with no JSON representation (byte buffers, live
/// streams) fail at encode time.
pub struct JsonCodec;

impl PrimitiveCodec for JsonCodec {
    fn test(&self, _value: &Value) -> bool {
        true
    }

    fn encode(&self, value: Value) -> Result<Bytes> {
        let json = value.to_json()?;
        Ok(Bytes::from(serde_json::to_vec(&json)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Value::from_json(json))
    }
}
