//! Self-delimiting binary framing for streamrpc.
//!
//! This is the wire layer everything else sits on. Three frame kinds
//! share one byte stream:
//! - Value frames carry one encoded value (or the declaration of a
//!   structural/generator value).
//! - Chunk frames carry one more byte-chunk of an open generator
//!   stream, identified by a 32-bit stream id.
//! - Chunk-end frames mark a generator stream as exhausted.
//!
//! All integers are big-endian. No partial reads, no buffer management
//! in user code.

pub mod codec;
pub mod error;
pub mod framed;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, CHUNK_END_SIZE, CHUNK_HEADER_SIZE,
    DEFAULT_MAX_PAYLOAD, KIND_CHUNK, KIND_CHUNK_END, KIND_VALUE, VALUE_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use framed::FrameCodec;
