use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::FrameError;

/// `tokio_util` codec for the streamrpc wire format.
///
/// Wrap a read half in `FramedRead` to get a lazy sequence of complete
/// frames from an arbitrarily-chunked byte source, and a write half in
/// `FramedWrite` to emit frames. The read side accumulates bytes in a
/// growing buffer until a full frame is available, then slices it off;
/// payload `Bytes` handed out are detached from that buffer.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    config: FrameConfig,
}

impl FrameCodec {
    /// Create a frame codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a frame codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.config.max_payload_size)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&frame, dst, self.config.max_payload_size)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::DEFAULT_MAX_PAYLOAD;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, FrameCodec::new());
        let mut reader = FramedRead::new(server, FrameCodec::new());

        writer.send(Frame::value(1, &b"ping"[..])).await.unwrap();
        writer.send(Frame::chunk(3, 2, &b"pong"[..])).await.unwrap();
        writer.send(Frame::chunk_end(3, 2)).await.unwrap();

        assert_eq!(
            reader.next().await.unwrap().unwrap(),
            Frame::value(1, &b"ping"[..])
        );
        assert_eq!(
            reader.next().await.unwrap().unwrap(),
            Frame::chunk(3, 2, &b"pong"[..])
        );
        assert_eq!(
            reader.next().await.unwrap().unwrap(),
            Frame::chunk_end(3, 2)
        );
    }

    #[tokio::test]
    async fn reassembles_frame_from_arbitrary_splits() {
        let mut wire = BytesMut::new();
        encode_frame(
            &Frame::value(4, &b"split across reads"[..]),
            &mut wire,
            DEFAULT_MAX_PAYLOAD,
        )
        .unwrap();

        // Feed the encoded frame through the duplex pipe in three
        // arbitrary slices.
        let (mut client, server) = tokio::io::duplex(64);
        let wire = wire.freeze();
        let slices = [wire.slice(..3), wire.slice(3..11), wire.slice(11..)];

        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for slice in slices {
                client.write_all(&slice).await.unwrap();
                client.flush().await.unwrap();
            }
        });

        let mut reader = FramedRead::new(server, FrameCodec::new());
        let frame = reader.next().await.unwrap().unwrap();
        assert_eq!(frame, Frame::value(4, &b"split across reads"[..]));

        writer.await.unwrap();
    }

    #[tokio::test]
    async fn oversize_frame_fails_decode() {
        let mut wire = BytesMut::new();
        encode_frame(&Frame::value(1, vec![0u8; 64]), &mut wire, usize::MAX).unwrap();

        let (mut client, server) = tokio::io::duplex(256);
        let codec = FrameCodec::with_config(FrameConfig {
            max_payload_size: 16,
        });
        let mut reader = FramedRead::new(server, codec);

        use tokio::io::AsyncWriteExt;
        client.write_all(&wire).await.unwrap();
        drop(client);

        let err = reader.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
