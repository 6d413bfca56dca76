use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::sync::mpsc;

use crate::error::{CodecError, Result};

/// The dynamic value model carried by RPC payloads.
///
/// Everything a call argument or result can be: scalars, byte buffers,
/// ordered aggregates, and live open-ended byte streams (generator
/// values). Streams are moved, not cloned, so `Value` is not `Clone`.
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// A set-like aggregate: distinct values in insertion order.
    /// Deduplication is the producer's responsibility; the codec layer
    /// transports the elements as given.
    Set(Vec<Value>),
    /// A generator value: materialized lazily, transmitted as a
    /// multiplexed stream of chunk frames under one id.
    Stream(ByteStream),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Extract the string slice, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract the number, if this is a number value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`.
    ///
    /// Byte buffers and streams have no JSON representation; they fail
    /// with `CodecError::Unsupported`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .ok_or(CodecError::Unsupported("non-finite number")),
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Bytes(_) => Err(CodecError::Unsupported("raw bytes in json value")),
            Value::Set(_) => Err(CodecError::Unsupported("set in json value")),
            Value::Array(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            )),
            Value::Object(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json()?);
                }
                Ok(serde_json::Value::Object(map))
            }
            Value::Stream(_) => Err(CodecError::Unsupported("stream in json value")),
        }
    }

    /// Convert from a `serde_json::Value`. Total; never fails.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Two streams are never equal: a live
    /// sequence has no comparable contents.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bytes(b) => write!(f, "Bytes(len={})", b.len()),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(entries) => f.debug_map().entries(entries).finish(),
            Value::Set(items) => f.debug_set().entries(items).finish(),
            Value::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        Value::Number(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Value {
        Value::Number(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Value {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Value {
        Value::Array(value)
    }
}

impl From<ByteStream> for Value {
    fn from(value: ByteStream) -> Value {
        Value::Stream(value)
    }
}

/// A live, open-ended sequence of byte chunks.
///
/// On the encode side, wraps any `Stream<Item = Bytes>`. On the decode
/// side, this is the materializing placeholder the decoder hands back
/// before any chunk has arrived; chunks appear as the peer emits them.
pub struct ByteStream {
    inner: ByteStreamInner,
}

enum ByteStreamInner {
    Source(Pin<Box<dyn Stream<Item = Bytes> + Send>>),
    Channel(mpsc::UnboundedReceiver<Bytes>),
}

impl ByteStream {
    /// Wrap a stream of byte chunks.
    pub fn from_stream(stream: impl Stream<Item = Bytes> + Send + 'static) -> Self {
        Self {
            inner: ByteStreamInner::Source(Box::pin(stream)),
        }
    }

    /// Build a finite stream from in-memory chunks.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        let chunks: Vec<Bytes> = chunks.into_iter().collect();
        Self::from_stream(futures_util::stream::iter(chunks))
    }

    /// Create a channel-backed stream plus the sender feeding it.
    ///
    /// Dropping the sender ends the stream.
    pub fn channel() -> (mpsc::UnboundedSender<Bytes>, ByteStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            ByteStream {
                inner: ByteStreamInner::Channel(rx),
            },
        )
    }

    /// Receive the next chunk, or `None` once the stream is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        futures_util::StreamExt::next(self).await
    }

    /// Drain the stream into one contiguous buffer.
    pub async fn collect_bytes(mut self) -> Bytes {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk);
        }
        buf.freeze()
    }
}

impl Stream for ByteStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        match &mut self.get_mut().inner {
            ByteStreamInner::Source(stream) => stream.as_mut().poll_next(cx),
            ByteStreamInner::Channel(rx) => rx.poll_recv(cx),
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            ByteStreamInner::Source(_) => f.write_str("ByteStream::Source"),
            ByteStreamInner::Channel(_) => f.write_str("ByteStream::Channel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Value::object([("x", Value::from(1)), ("y", Value::from("two"))]);
        let b = Value::object([("x", Value::from(1)), ("y", Value::from("two"))]);
        assert_eq!(a, b);

        let c = Value::object([("x", Value::from(2))]);
        assert_ne!(a, c);
    }

    #[test]
    fn streams_are_never_equal() {
        let (_tx1, s1) = ByteStream::channel();
        let (_tx2, s2) = ByteStream::channel();
        assert_ne!(Value::Stream(s1), Value::Stream(s2));
    }

    #[test]
    fn json_roundtrip() {
        let value = Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::from(42),
            Value::from("text"),
        ]);
        let json = value.to_json().unwrap();
        assert_eq!(Value::from_json(json), value);
    }

    #[test]
    fn json_rejects_streams_and_bytes() {
        let (_tx, stream) = ByteStream::channel();
        assert!(Value::Stream(stream).to_json().is_err());
        assert!(Value::Bytes(Bytes::from_static(b"raw")).to_json().is_err());
    }

    #[tokio::test]
    async fn channel_stream_delivers_chunks_in_order() {
        let (tx, stream) = ByteStream::channel();
        tx.send(Bytes::from_static(b"one")).unwrap();
        tx.send(Bytes::from_static(b"two")).unwrap();
        drop(tx);

        assert_eq!(stream.collect_bytes().await.as_ref(), b"onetwo");
    }

    #[tokio::test]
    async fn from_chunks_is_finite() {
        let mut stream = ByteStream::from_chunks([Bytes::from_static(b"a")]);
        assert_eq!(stream.next_chunk().await.unwrap().as_ref(), b"a");
        assert!(stream.next_chunk().await.is_none());
    }
}
