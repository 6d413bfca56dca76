/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame starts with an unknown kind tag. Indicates a framing
    /// mismatch between peers; fatal to the connection.
    #[error("unknown frame kind 0x{0:02x}")]
    UnknownKind(u8),

    /// The payload exceeds the configured maximum size or the 32-bit
    /// length field's range.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
