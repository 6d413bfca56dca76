//! Pluggable codec type system and stream multiplexer for streamrpc.
//!
//! Three codec kinds turn arbitrary structured [`Value`]s into frames
//! and back:
//! - primitive codecs are one-shot byte conversions,
//! - structural codecs decompose aggregates whose sub-values recurse
//!   through the same resolution process,
//! - generator codecs declare a stream id and transmit live values as
//!   multiplexed chunk frames.
//!
//! [`CodecRegistry`] resolves values to codecs in registration order;
//! [`Encoder`] and [`Decoder`] drive the frame-level pipeline.

pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod ids;
pub mod registry;
pub mod standard;
pub mod value;

pub use codec::{
    ChunkSink, ChunkSource, Codec, GeneratorCodec, Key, Layout, PrimitiveCodec, StructuralBuilder,
    StructuralCodec, StructuralParts,
};
pub use decode::Decoder;
pub use encode::{Encoder, FrameSink};
pub use error::{CodecError, Result};
pub use ids::{IdAllocator, IdRegistry};
pub use registry::{CodecRef, CodecRegistry};
pub use value::{ByteStream, Value};
