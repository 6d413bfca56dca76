use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use streamrpc_frame::{Frame, FrameError};
use tracing::{debug, warn};

use crate::codec::{ChunkSink, Key, Layout};
use crate::error::{CodecError, Result};
use crate::registry::{CodecRef, CodecRegistry};
use crate::value::Value;

/// Deserializes a frame stream back into values, routing generator
/// chunks to their sinks along the way.
///
/// The routing table `id -> sink` is shared across every value decoded
/// from this source, so generator values nested inside structural
/// values multiplex through the same table. Chunk and chunk-end frames
/// may interleave arbitrarily with value frames; the only ordering
/// assumption is that a stream's declaration precedes its chunks,
/// which precede its chunk-end.
pub struct Decoder<S> {
    frames: S,
    registry: Arc<CodecRegistry>,
    open: HashMap<u32, Box<dyn ChunkSink>>,
}

impl<S> Decoder<S>
where
    S: Stream<Item = std::result::Result<Frame, FrameError>> + Unpin + Send,
{
    pub fn new(frames: S, registry: Arc<CodecRegistry>) -> Self {
        Self {
            frames,
            registry,
            open: HashMap::new(),
        }
    }

    /// Number of generator streams currently open.
    pub fn open_streams(&self) -> usize {
        self.open.len()
    }

    /// Decode the next top-level value, or `None` at end of stream.
    ///
    /// Protocol violations (unknown codec header, unknown stream id, a
    /// truncated structural value) are fatal: the caller should drop
    /// the decoder and terminate the connection.
    pub async fn next_value(&mut self) -> Result<Option<Value>> {
        match self.next_value_frame().await? {
            None => Ok(None),
            Some((header, payload)) => {
                let value = self.decode_declared(header, payload).await?;
                Ok(Some(value))
            }
        }
    }

    /// Pull the next value frame, routing chunk frames as they pass.
    async fn next_value_frame(&mut self) -> Result<Option<(u8, Bytes)>> {
        loop {
            match self.frames.next().await {
                None => {
                    // End of stream: any generators still open will
                    // never see their chunk-end; dropping their sinks
                    // ends the placeholder streams.
                    if !self.open.is_empty() {
                        debug!(open = self.open.len(), "byte stream ended with open streams");
                        self.open.clear();
                    }
                    return Ok(None);
                }
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(Frame::Value { header, payload })) => {
                    return Ok(Some((header, payload)))
                }
                Some(Ok(Frame::Chunk { id, payload, .. })) => self.push_chunk(id, payload)?,
                Some(Ok(Frame::ChunkEnd { id, .. })) => self.end_chunk_stream(id)?,
            }
        }
    }

    fn push_chunk(&mut self, id: u32, payload: Bytes) -> Result<()> {
        match self.open.get_mut(&id) {
            Some(sink) => sink.push(payload),
            None => {
                warn!(id, "chunk frame for unknown stream");
                Err(CodecError::UnknownStream(id))
            }
        }
    }

    fn end_chunk_stream(&mut self, id: u32) -> Result<()> {
        match self.open.remove(&id) {
            Some(mut sink) => {
                sink.finish();
                Ok(())
            }
            None => {
                warn!(id, "chunk-end frame for unknown stream");
                Err(CodecError::UnknownStream(id))
            }
        }
    }

    /// Decode a declared value. Boxed because structural decoding
    /// recurses through arbitrary nesting depth.
    fn decode_declared<'a>(
        &'a mut self,
        header: u8,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            let registry = Arc::clone(&self.registry);
            match registry.by_header(header)? {
                CodecRef::Primitive(codec) => codec.decode(&payload),
                CodecRef::Generator(codec) => {
                    let id: u32 = serde_json::from_slice(&payload)?;
                    let (placeholder, sink) = codec.decode();
                    self.open.insert(id, sink);
                    debug!(id, header, "opened generator stream");
                    Ok(placeholder)
                }
                CodecRef::Structural(codec) => {
                    let layout: Layout = serde_json::from_slice(&payload)?;
                    let mut builder = codec.decode();
                    for slot in 0..layout.len() {
                        let Some((sub_header, sub_payload)) = self.next_value_frame().await?
                        else {
                            return Err(CodecError::Truncated);
                        };
                        let sub = self.decode_declared(sub_header, sub_payload).await?;
                        match &layout {
                            Layout::Count(_) => builder.set(sub, Key::Index(slot as u64)),
                            Layout::Keys(keys) => builder.set(sub, Key::Name(&keys[slot])),
                        }
                    }
                    Ok(builder.finish())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::encode::Encoder;
    use crate::value::ByteStream;

    /// Encode values, then decode the resulting frame sequence.
    async fn roundtrip(values: Vec<Value>) -> Vec<Value> {
        let registry = Arc::new(CodecRegistry::standard());
        let encoder = Encoder::new(Arc::clone(&registry));
        let (tx, rx) = mpsc::unbounded_channel();

        for value in values {
            encoder.encode(value, &tx).unwrap();
        }
        drop(tx);

        let frames =
            tokio_stream(rx).map(Ok::<_, FrameError>);
        let mut decoder = Decoder::new(frames, registry);
        let mut decoded = Vec::new();
        while let Some(value) = decoder.next_value().await.unwrap() {
            decoded.push(value);
        }
        decoded
    }

    fn tokio_stream(
        rx: mpsc::UnboundedReceiver<Frame>,
    ) -> impl Stream<Item = Frame> + Unpin + Send {
        futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
        .boxed()
    }

    #[tokio::test]
    async fn primitive_roundtrip() {
        let decoded = roundtrip(vec![Value::from("hello"), Value::from(42)]).await;
        assert_eq!(decoded, vec![Value::from("hello"), Value::from(42)]);
    }

    #[tokio::test]
    async fn fallback_roundtrip() {
        let decoded = roundtrip(vec![Value::Null, Value::Bool(true)]).await;
        assert_eq!(decoded, vec![Value::Null, Value::Bool(true)]);
    }

    #[tokio::test]
    async fn nested_structural_roundtrip() {
        // Depth 3: object -> array -> object.
        let value = Value::object([
            (
                "outer",
                Value::Array(vec![
                    Value::object([("inner", Value::from(1))]),
                    Value::from("mid"),
                ]),
            ),
            ("flag", Value::Bool(false)),
        ]);
        let expected = Value::object([
            (
                "outer",
                Value::Array(vec![
                    Value::object([("inner", Value::from(1))]),
                    Value::from("mid"),
                ]),
            ),
            ("flag", Value::Bool(false)),
        ]);

        let decoded = roundtrip(vec![value]).await;
        assert_eq!(decoded, vec![expected]);
    }

    #[tokio::test]
    async fn set_roundtrip() {
        let value = Value::Set(vec![
            Value::from("a"),
            Value::from(1),
            Value::Array(vec![Value::from("nested")]),
        ]);
        let expected = Value::Set(vec![
            Value::from("a"),
            Value::from(1),
            Value::Array(vec![Value::from("nested")]),
        ]);

        let decoded = roundtrip(vec![value]).await;
        assert_eq!(decoded, vec![expected]);
    }

    #[tokio::test]
    async fn empty_aggregates_roundtrip() {
        let decoded = roundtrip(vec![
            Value::Array(Vec::new()),
            Value::Object(Default::default()),
        ])
        .await;
        assert_eq!(
            decoded,
            vec![Value::Array(Vec::new()), Value::Object(Default::default())]
        );
    }

    #[tokio::test]
    async fn generator_roundtrip() {
        let stream = ByteStream::from_chunks([
            Bytes::from_static(b"live "),
            Bytes::from_static(b"data"),
        ]);

        let mut decoded = roundtrip(vec![Value::Stream(stream)]).await;
        assert_eq!(decoded.len(), 1);
        let Value::Stream(stream) = decoded.remove(0) else {
            panic!("expected stream placeholder");
        };
        assert_eq!(stream.collect_bytes().await.as_ref(), b"live data");
    }

    #[tokio::test]
    async fn generator_nested_in_structural() {
        let value = Value::object([(
            "body",
            Value::Stream(ByteStream::from_chunks([Bytes::from_static(b"payload")])),
        )]);

        let mut decoded = roundtrip(vec![value]).await;
        let Value::Object(mut entries) = decoded.remove(0) else {
            panic!("expected object");
        };
        let Some(Value::Stream(stream)) = entries.remove("body") else {
            panic!("expected stream under \"body\"");
        };
        assert_eq!(stream.collect_bytes().await.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn two_interleaved_streams_decode_independently() {
        let registry = Arc::new(CodecRegistry::standard());
        let mut decoder = {
            // Hand-build an interleaved frame sequence: declarations
            // for ids 0 and 1, then alternating chunks, then ends.
            let frames = vec![
                Frame::value(1, &b"0"[..]),
                Frame::value(1, &b"1"[..]),
                Frame::chunk(0, 1, &b"a0"[..]),
                Frame::chunk(1, 1, &b"b0"[..]),
                Frame::chunk(0, 1, &b"a1"[..]),
                Frame::chunk(1, 1, &b"b1"[..]),
                Frame::chunk(1, 1, &b"b2"[..]),
                Frame::chunk(0, 1, &b"a2"[..]),
                Frame::chunk_end(0, 1),
                Frame::chunk_end(1, 1),
            ];
            Decoder::new(
                futures_util::stream::iter(frames).map(Ok::<_, FrameError>).boxed(),
                registry,
            )
        };

        let Some(Value::Stream(first)) = decoder.next_value().await.unwrap() else {
            panic!("expected first stream");
        };
        let Some(Value::Stream(second)) = decoder.next_value().await.unwrap() else {
            panic!("expected second stream");
        };
        assert_eq!(decoder.open_streams(), 2);

        // Drain the remaining frames; both streams end.
        assert!(decoder.next_value().await.unwrap().is_none());
        assert_eq!(decoder.open_streams(), 0);

        assert_eq!(first.collect_bytes().await.as_ref(), b"a0a1a2");
        assert_eq!(second.collect_bytes().await.as_ref(), b"b0b1b2");
    }

    #[tokio::test]
    async fn chunk_for_unknown_stream_is_fatal() {
        let registry = Arc::new(CodecRegistry::standard());
        let frames = vec![Frame::chunk(5, 1, &b"orphan"[..])];
        let mut decoder = Decoder::new(
            futures_util::stream::iter(frames).map(Ok::<_, FrameError>).boxed(),
            registry,
        );

        let err = decoder.next_value().await.unwrap_err();
        assert!(matches!(err, CodecError::UnknownStream(5)));
    }

    #[tokio::test]
    async fn chunk_end_for_unknown_stream_is_fatal() {
        let registry = Arc::new(CodecRegistry::standard());
        let frames = vec![Frame::chunk_end(9, 1)];
        let mut decoder = Decoder::new(
            futures_util::stream::iter(frames).map(Ok::<_, FrameError>).boxed(),
            registry,
        );

        let err = decoder.next_value().await.unwrap_err();
        assert!(matches!(err, CodecError::UnknownStream(9)));
    }

    #[tokio::test]
    async fn unknown_codec_header_is_fatal() {
        let registry = Arc::new(CodecRegistry::standard());
        let frames = vec![Frame::value(99, &b""[..])];
        let mut decoder = Decoder::new(
            futures_util::stream::iter(frames).map(Ok::<_, FrameError>).boxed(),
            registry,
        );

        let err = decoder.next_value().await.unwrap_err();
        assert!(matches!(err, CodecError::UnknownCodec(99)));
    }

    #[tokio::test]
    async fn truncated_structural_is_fatal() {
        let registry = Arc::new(CodecRegistry::standard());
        // Declares two sub-values but provides only one.
        let frames = vec![Frame::value(2, &b"2"[..]), Frame::value(6, Bytes::from(1.0f64.to_be_bytes().to_vec()))];
        let mut decoder = Decoder::new(
            futures_util::stream::iter(frames).map(Ok::<_, FrameError>).boxed(),
            registry,
        );

        let err = decoder.next_value().await.unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }
}
