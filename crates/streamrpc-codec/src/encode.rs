use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::Mutex;
use streamrpc_frame::Frame;
use tokio::sync::mpsc;
use tracing::debug;

use crate::codec::ChunkSource;
use crate::error::{CodecError, Result};
use crate::ids::IdAllocator;
use crate::registry::{CodecRef, CodecRegistry};
use crate::value::Value;

/// The outgoing frame queue.
///
/// Frames are emitted in the order their producing step executed; a
/// single writer task drains the queue onto the byte channel, so the
/// wire order matches.
pub type FrameSink = mpsc::UnboundedSender<Frame>;

/// Serializes values into frames.
///
/// Scalar and structural values are written synchronously. A generator
/// value only declares its stream id synchronously; its chunks are
/// pumped by a background task as the source produces them, so an
/// open-ended stream never blocks the values that follow it.
pub struct Encoder {
    registry: Arc<CodecRegistry>,
    stream_ids: Arc<Mutex<IdAllocator>>,
}

impl Encoder {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self {
            registry,
            stream_ids: Arc::new(Mutex::new(IdAllocator::new())),
        }
    }

    /// Serialize one value onto the frame sink.
    ///
    /// Fails with `SinkClosed` if the connection's writer is gone, or
    /// with the underlying codec error; nothing useful can be salvaged
    /// from a partially-written value either way.
    pub fn encode(&self, value: Value, out: &FrameSink) -> Result<()> {
        let header = self.registry.resolve(&value);
        let registry = Arc::clone(&self.registry);
        match registry.by_header(header)? {
            CodecRef::Primitive(codec) => {
                let payload = codec.encode(value)?;
                send(out, Frame::value(header, payload))
            }
            CodecRef::Structural(codec) => {
                let parts = codec.encode(value)?;
                let layout = Bytes::from(serde_json::to_vec(&parts.layout)?);
                send(out, Frame::value(header, layout))?;
                for sub in parts.values {
                    self.encode(sub, out)?;
                }
                Ok(())
            }
            CodecRef::Generator(codec) => {
                let id = self.stream_ids.lock().create();
                let declaration = Bytes::from(serde_json::to_vec(&id)?);
                send(out, Frame::value(header, declaration))?;

                let source = codec.encode(value)?;
                self.spawn_pump(id, header, source, out.clone());
                Ok(())
            }
        }
    }

    fn spawn_pump(&self, id: u32, header: u8, mut source: ChunkSource, out: FrameSink) {
        let stream_ids = Arc::clone(&self.stream_ids);
        tokio::spawn(async move {
            while let Some(chunk) = source.next().await {
                if out.send(Frame::chunk(id, header, chunk)).is_err() {
                    // Connection closed under us; stop pumping.
                    debug!(id, "frame sink closed mid-stream");
                    break;
                }
            }
            let _ = out.send(Frame::chunk_end(id, header));
            stream_ids.lock().free(id);
        });
    }
}

fn send(out: &FrameSink, frame: Frame) -> Result<()> {
    out.send(frame).map_err(|_| CodecError::SinkClosed)
}
