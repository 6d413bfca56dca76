use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Value;

/// How a structural value's sub-values are keyed.
///
/// Serialized as JSON in the declaration frame: a bare number for
/// index-keyed aggregates, an array of strings for name-keyed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Layout {
    Count(u64),
    Keys(Vec<String>),
}

impl Layout {
    /// Number of sub-values declared by this layout.
    pub fn len(&self) -> usize {
        match self {
            Layout::Count(count) => *count as usize,
            Layout::Keys(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The decomposition of a structural value: its layout plus the
/// sub-values to serialize recursively, in layout order.
#[derive(Debug)]
pub struct StructuralParts {
    pub layout: Layout,
    pub values: Vec<Value>,
}

/// Key under which a decoded sub-value is installed into an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Index(u64),
    Name(&'a str),
}

/// Rebuilds a structural value one sub-value at a time.
///
/// Obtained from [`StructuralCodec::decode`]; starts from the empty
/// aggregate, receives each decoded sub-value under its key, and
/// yields the finished value.
pub trait StructuralBuilder: Send {
    fn set(&mut self, value: Value, key: Key<'_>);
    fn finish(self: Box<Self>) -> Value;
}

/// A lazy, possibly-infinite sequence of encoded byte chunks.
pub type ChunkSource = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// The live decode side of a generator value: accepts byte chunks as
/// they arrive and feeds the materializing placeholder value.
pub trait ChunkSink: Send {
    /// Accept one more chunk.
    fn push(&mut self, chunk: Bytes) -> Result<()>;
    /// The stream is exhausted; no further chunks will arrive.
    fn finish(&mut self);
}

/// One-shot codec for self-contained values. No recursion.
pub trait PrimitiveCodec: Send + Sync {
    fn test(&self, value: &Value) -> bool;
    fn encode(&self, value: Value) -> Result<Bytes>;
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// Codec for aggregates whose sub-values are serialized recursively by
/// the same codec resolution process.
pub trait StructuralCodec: Send + Sync {
    fn test(&self, value: &Value) -> bool;
    fn encode(&self, value: Value) -> Result<StructuralParts>;
    fn decode(&self) -> Box<dyn StructuralBuilder>;
}

/// Codec for open-ended values transmitted as a multiplexed stream of
/// chunk frames under one id.
pub trait GeneratorCodec: Send + Sync {
    fn test(&self, value: &Value) -> bool;
    fn encode(&self, value: Value) -> Result<ChunkSource>;
    /// Create a fresh decode sink. Returns the materializing
    /// placeholder to hand back to the caller immediately, plus the
    /// sink subsequent chunk frames are routed into.
    fn decode(&self) -> (Value, Box<dyn ChunkSink>);
}

/// A registered codec of any kind.
pub enum Codec {
    Primitive(Box<dyn PrimitiveCodec>),
    Structural(Box<dyn StructuralCodec>),
    Generator(Box<dyn GeneratorCodec>),
}

impl Codec {
    pub(crate) fn test(&self, value: &Value) -> bool {
        match self {
            Codec::Primitive(codec) => codec.test(value),
            Codec::Structural(codec) => codec.test(value),
            Codec::Generator(codec) => codec.test(value),
        }
    }
}
