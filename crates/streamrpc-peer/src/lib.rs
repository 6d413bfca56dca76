//! Bidirectional stream RPC transport for streamrpc.
//!
//! An [`RpcPeer`] binds to the two halves of any ordered byte channel
//! and speaks the streamrpc protocol over it: marker-keyed envelopes
//! carried as codec-encoded values, with request ids correlating each
//! response or error back to its call. Both endpoints are symmetric:
//! expose methods with [`Methods`], invoke remote ones with
//! [`RpcPeer::call`].

pub mod envelope;
pub mod error;
pub mod methods;
pub mod peer;

pub use envelope::{
    Envelope, ErrorEnvelope, Request, Response, RpcCall, CALL_KEY, ERROR_KEY, REQUEST_KEY,
    RESPONSE_KEY,
};
pub use error::{Result, RpcError};
pub use methods::{Handler, HandlerFuture, Methods};
pub use peer::{CloseGuard, PeerConfig, RpcPeer};
