use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{FrameError, Result};

/// Frame kind tag: a fully-resolved encoded value or a stream declaration.
pub const KIND_VALUE: u8 = 1;
/// Frame kind tag: one more byte-chunk for an open stream.
pub const KIND_CHUNK: u8 = 2;
/// Frame kind tag: the stream identified by `id` is exhausted.
pub const KIND_CHUNK_END: u8 = 3;

/// Value frame header: kind (1) + codec header (1) + length (4) = 6 bytes.
pub const VALUE_HEADER_SIZE: usize = 6;

/// Chunk frame header: kind (1) + codec header (1) + length (4) + id (4) = 10 bytes.
pub const CHUNK_HEADER_SIZE: usize = 10;

/// Chunk-end frame: kind (1) + codec header (1) + id (4) = 6 bytes, no payload.
pub const CHUNK_END_SIZE: usize = 6;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One self-delimiting unit of the wire format.
///
/// Every frame carries the codec header byte that the decoder resolves
/// back to a codec. All multi-byte integers are big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One fully-resolved encoded value, or the declaration of a
    /// structural/generator value (kind = 1).
    Value { header: u8, payload: Bytes },
    /// A byte-chunk belonging to the open stream `id` (kind = 2).
    Chunk {
        id: u32,
        header: u8,
        payload: Bytes,
    },
    /// End-of-stream marker for `id` (kind = 3).
    ChunkEnd { id: u32, header: u8 },
}

impl Frame {
    /// Build a value frame.
    pub fn value(header: u8, payload: impl Into<Bytes>) -> Self {
        Frame::Value {
            header,
            payload: payload.into(),
        }
    }

    /// Build a chunk frame for the open stream `id`.
    pub fn chunk(id: u32, header: u8, payload: impl Into<Bytes>) -> Self {
        Frame::Chunk {
            id,
            header,
            payload: payload.into(),
        }
    }

    /// Build a chunk-end frame for the open stream `id`.
    pub fn chunk_end(id: u32, header: u8) -> Self {
        Frame::ChunkEnd { id, header }
    }

    /// The codec header byte carried by this frame.
    pub fn header(&self) -> u8 {
        match self {
            Frame::Value { header, .. }
            | Frame::Chunk { header, .. }
            | Frame::ChunkEnd { header, .. } => *header,
        }
    }

    /// The total wire size of this frame (fixed header + payload).
    pub fn wire_size(&self) -> usize {
        match self {
            Frame::Value { payload, .. } => VALUE_HEADER_SIZE + payload.len(),
            Frame::Chunk { payload, .. } => CHUNK_HEADER_SIZE + payload.len(),
            Frame::ChunkEnd { .. } => CHUNK_END_SIZE,
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire layouts (all integers big-endian):
/// ```text
/// value:     [kind=1][codec header][length u32][payload…]
/// chunk:     [kind=2][codec header][length u32][id u32][payload…]
/// chunk-end: [kind=3][codec header][id u32]
/// ```
///
/// Pure except for appending to `dst`; reserves exactly the frame's wire
/// size and writes nothing on failure.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut, max_payload: usize) -> Result<()> {
    let limit = max_payload.min(u32::MAX as usize);
    match frame {
        Frame::Value { header, payload } => {
            if payload.len() > limit {
                return Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max: limit,
                });
            }
            dst.reserve(VALUE_HEADER_SIZE + payload.len());
            dst.put_u8(KIND_VALUE);
            dst.put_u8(*header);
            dst.put_u32(payload.len() as u32);
            dst.put_slice(payload);
        }
        Frame::Chunk {
            id,
            header,
            payload,
        } => {
            if payload.len() > limit {
                return Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max: limit,
                });
            }
            dst.reserve(CHUNK_HEADER_SIZE + payload.len());
            dst.put_u8(KIND_CHUNK);
            dst.put_u8(*header);
            dst.put_u32(payload.len() as u32);
            dst.put_u32(*id);
            dst.put_slice(payload);
        }
        Frame::ChunkEnd { id, header } => {
            dst.reserve(CHUNK_END_SIZE);
            dst.put_u8(KIND_CHUNK_END);
            dst.put_u8(*header);
            dst.put_u32(*id);
        }
    }
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly one frame's bytes from the buffer; the
/// remainder stays in `src` for the next call.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.is_empty() {
        return Ok(None);
    }

    match src[0] {
        KIND_VALUE => {
            if src.len() < VALUE_HEADER_SIZE {
                return Ok(None); // Need more data
            }
            let header = src[1];
            let payload_len = read_u32(src, 2) as usize;
            check_payload(payload_len, max_payload)?;

            let total = VALUE_HEADER_SIZE + payload_len;
            if src.len() < total {
                return Ok(None);
            }

            src.advance(VALUE_HEADER_SIZE);
            let payload = src.split_to(payload_len).freeze();
            Ok(Some(Frame::Value { header, payload }))
        }
        KIND_CHUNK => {
            if src.len() < CHUNK_HEADER_SIZE {
                return Ok(None);
            }
            let header = src[1];
            let payload_len = read_u32(src, 2) as usize;
            let id = read_u32(src, 6);
            check_payload(payload_len, max_payload)?;

            let total = CHUNK_HEADER_SIZE + payload_len;
            if src.len() < total {
                return Ok(None);
            }

            src.advance(CHUNK_HEADER_SIZE);
            let payload = src.split_to(payload_len).freeze();
            Ok(Some(Frame::Chunk {
                id,
                header,
                payload,
            }))
        }
        KIND_CHUNK_END => {
            if src.len() < CHUNK_END_SIZE {
                return Ok(None);
            }
            let header = src[1];
            let id = read_u32(src, 2);
            src.advance(CHUNK_END_SIZE);
            Ok(Some(Frame::ChunkEnd { id, header }))
        }
        kind => {
            warn!(kind, "unknown frame kind");
            Err(FrameError::UnknownKind(kind))
        }
    }
}

fn read_u32(src: &BytesMut, offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&src[offset..offset + 4]);
    u32::from_be_bytes(bytes)
}

fn check_payload(size: usize, max_payload: usize) -> Result<()> {
    if size > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: max_payload,
        });
    }
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    ///
    /// The 32-bit length field caps payloads at `u32::MAX` regardless of
    /// this setting.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
