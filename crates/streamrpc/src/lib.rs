//! Transport-agnostic streaming RPC over any ordered byte channel.
//!
//! streamrpc layers three crates into one protocol stack:
//! - [`streamrpc_frame`]: self-delimiting binary frames over a raw
//!   byte stream.
//! - [`streamrpc_codec`]: a pluggable codec type system that turns
//!   structured values (including live byte streams) into frames,
//!   multiplexing open streams by id.
//! - [`streamrpc_peer`]: marker-keyed Request/Response/Error envelopes
//!   and the symmetric [`RpcPeer`] endpoint.
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamrpc::{CodecRegistry, Methods, PeerConfig, RpcPeer, Value};
//!
//! # async fn run() -> Result<(), streamrpc::RpcError> {
//! let (local, _remote) = tokio::io::duplex(4096);
//! let (read, write) = tokio::io::split(local);
//!
//! let methods = Methods::new().expose("echo", |mut args: Vec<Value>| async move {
//!     Ok(args.pop().unwrap_or(Value::Null))
//! });
//! let peer = RpcPeer::spawn(
//!     read,
//!     write,
//!     methods,
//!     Arc::new(CodecRegistry::standard()),
//!     PeerConfig::default(),
//! );
//!
//! let reply = peer.call("echo", vec![Value::from("hello")]).await?;
//! assert_eq!(reply, Value::from("hello"));
//! # Ok(())
//! # }
//! ```

pub mod logging;

pub use streamrpc_codec::{
    ByteStream, ChunkSink, ChunkSource, Codec, CodecError, CodecRegistry, Decoder, Encoder,
    GeneratorCodec, Key, Layout, PrimitiveCodec, StructuralBuilder, StructuralCodec,
    StructuralParts, Value,
};
pub use streamrpc_frame::{Frame, FrameCodec, FrameConfig, FrameError};
pub use streamrpc_peer::{
    CloseGuard, Envelope, ErrorEnvelope, Handler, Methods, PeerConfig, Request, Response, RpcCall,
    RpcError, RpcPeer,
};
