use streamrpc_codec::{CodecError, Value};
use streamrpc_frame::FrameError;
use thiserror::Error;

/// Errors surfaced by the peer transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The peer closed (or was never open) before the call completed.
    /// Calls pending at close time all fail with this.
    #[error("rpc channel closed")]
    ChannelClosed,

    /// The remote side has no handler at the requested path.
    #[error("no method exposed at \"{0}\"")]
    MethodNotFound(String),

    /// The remote handler failed; carries the error value it produced.
    #[error("remote handler failed")]
    Remote(Value),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T, E = RpcError> = std::result::Result<T, E>;
