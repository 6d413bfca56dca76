/// Errors that can occur while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A frame's codec header is outside the configured codec table.
    /// Indicates a codec-table mismatch between peers; fatal to the
    /// connection.
    #[error("unknown codec header {0}")]
    UnknownCodec(u8),

    /// A chunk or chunk-end frame referenced a stream id that was
    /// never declared (or already ended). Fatal to the connection.
    #[error("unknown stream id {0}")]
    UnknownStream(u32),

    /// The value cannot be represented by the selected codec.
    #[error("unsupported value: {0}")]
    Unsupported(&'static str),

    /// The frame stream ended in the middle of a structural value.
    #[error("byte stream ended mid-value")]
    Truncated,

    /// The outgoing frame sink is gone; the connection closed while
    /// encoding.
    #[error("frame sink closed")]
    SinkClosed,

    /// A declaration or fallback payload failed to parse as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A string payload was not valid UTF-8.
    #[error("invalid utf-8 in string payload")]
    Utf8(#[from] std::str::Utf8Error),

    /// Framing-level error.
    #[error("frame error: {0}")]
    Frame(#[from] streamrpc_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
