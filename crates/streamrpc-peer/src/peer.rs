//! The bidirectional RPC peer.
//!
//! One peer owns both directions of a byte channel: a writer task
//! drains the outgoing frame queue onto the write half, a reader task
//! decodes values off the read half and dispatches them. Both sides of
//! a connection run the same type; either may call and either may
//! serve.
//!
//! Lifecycle is `Open -> Closing -> Closed`. [`RpcPeer::close`]
//! initiates a graceful shutdown: no new outgoing values are accepted,
//! queued frames and in-flight stream pumps drain, then the write half
//! shuts down. The peer reaches `Closed` when the incoming byte stream
//! ends (or a protocol violation terminates it), at which point every
//! still-pending call fails with [`RpcError::ChannelClosed`] and close
//! hooks fire exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::SinkExt;
use parking_lot::Mutex;
use streamrpc_codec::{CodecRegistry, Decoder, Encoder, FrameSink, IdRegistry, Value};
use streamrpc_frame::{Frame, FrameCodec, FrameConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::envelope::{Envelope, ErrorEnvelope, Request, Response, RpcCall};
use crate::error::{Result, RpcError};
use crate::methods::Methods;

/// Peer construction options.
#[derive(Debug, Clone, Default)]
pub struct PeerConfig {
    pub frame: FrameConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    Open,
    Closing,
    Closed,
}

/// Resolves a pending call with the remote outcome; dropped unsent at
/// close, which the caller observes as `ChannelClosed`.
type CallSlot = oneshot::Sender<Result<Value, Value>>;

#[derive(Default)]
struct CloseHooks {
    fired: bool,
    next: u64,
    entries: HashMap<u64, Box<dyn FnOnce() + Send>>,
}

struct Shared {
    encoder: Encoder,
    // Holding this lock across an encode keeps the frames of one
    // top-level value contiguous on the queue; `None` once closing.
    out: Mutex<Option<FrameSink>>,
    calls: Mutex<IdRegistry<CallSlot>>,
    state: Mutex<PeerState>,
    hooks: Mutex<CloseHooks>,
}

impl Shared {
    fn send_value(&self, value: Value) -> Result<()> {
        let out = self.out.lock();
        match out.as_ref() {
            Some(sink) => self.encoder.encode(value, sink).map_err(Into::into),
            None => Err(RpcError::ChannelClosed),
        }
    }

    /// Transition to `Closed`, reject pending calls, fire close hooks.
    /// Idempotent.
    fn finish_close(&self) {
        {
            let mut state = self.state.lock();
            if *state == PeerState::Closed {
                return;
            }
            *state = PeerState::Closed;
        }
        *self.out.lock() = None;

        let pending = self.calls.lock().drain();
        if !pending.is_empty() {
            debug!(pending = pending.len(), "rejecting calls pending at close");
        }
        drop(pending);

        let hooks = {
            let mut hooks = self.hooks.lock();
            hooks.fired = true;
            std::mem::take(&mut hooks.entries)
        };
        for (_, hook) in hooks {
            hook();
        }
    }
}

/// Registration handle for a close hook. Dropping the guard leaves the
/// hook registered; call [`unsubscribe`](CloseGuard::unsubscribe) to
/// remove it.
pub struct CloseGuard {
    shared: Arc<Shared>,
    id: Option<u64>,
}

impl CloseGuard {
    pub fn unsubscribe(self) {
        if let Some(id) = self.id {
            self.shared.hooks.lock().entries.remove(&id);
        }
    }
}

/// An RPC endpoint bound to one byte channel.
#[derive(Clone)]
pub struct RpcPeer {
    shared: Arc<Shared>,
}

impl RpcPeer {
    /// Bind a peer to a byte channel and start its reader and writer
    /// tasks. `methods` is what this side serves; `registry` must
    /// match the remote side's.
    pub fn spawn<R, W>(
        read: R,
        write: W,
        methods: Methods,
        registry: Arc<CodecRegistry>,
        config: PeerConfig,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out, frames) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            encoder: Encoder::new(Arc::clone(&registry)),
            out: Mutex::new(Some(out)),
            calls: Mutex::new(IdRegistry::new()),
            state: Mutex::new(PeerState::Open),
            hooks: Mutex::new(CloseHooks::default()),
        });

        let codec = FrameCodec::with_config(config.frame);
        tokio::spawn(write_loop(frames, FramedWrite::new(write, codec.clone())));
        tokio::spawn(read_loop(
            FramedRead::new(read, codec),
            registry,
            Arc::new(methods),
            Arc::clone(&shared),
        ));

        Self { shared }
    }

    /// Invoke a method on the remote peer and await its outcome.
    ///
    /// `path` is dot-separated, e.g. `"math.add"`. Arguments and the
    /// result may carry any [`Value`], including live streams.
    pub async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value> {
        if *self.shared.state.lock() != PeerState::Open {
            return Err(RpcError::ChannelClosed);
        }

        let (slot, pending) = oneshot::channel();
        let request_id = self.shared.calls.lock().register(slot);

        let call = RpcCall::new(path.split('.'), args);
        let request = Request::new(request_id, call.into_value()).into_value();
        if let Err(err) = self.shared.send_value(request) {
            self.shared.calls.lock().free(request_id);
            return Err(err);
        }

        match pending.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(RpcError::Remote(error)),
            Err(_) => Err(RpcError::ChannelClosed),
        }
    }

    /// Initiate a graceful shutdown.
    ///
    /// New calls are rejected immediately; frames already queued (and
    /// chunk streams still pumping) drain before the write half shuts
    /// down. Calls awaiting a reply stay pending until the incoming
    /// stream ends.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state != PeerState::Open {
                return;
            }
            *state = PeerState::Closing;
        }
        *self.shared.out.lock() = None;
    }

    /// Whether this peer has left the `Open` state.
    pub fn closed(&self) -> bool {
        *self.shared.state.lock() != PeerState::Open
    }

    /// Register a hook that fires once when the peer reaches `Closed`.
    /// If it already has, the hook fires immediately.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) -> CloseGuard {
        let mut hooks = self.shared.hooks.lock();
        if hooks.fired {
            drop(hooks);
            hook();
            return CloseGuard {
                shared: Arc::clone(&self.shared),
                id: None,
            };
        }
        let id = hooks.next;
        hooks.next += 1;
        hooks.entries.insert(id, Box::new(hook));
        CloseGuard {
            shared: Arc::clone(&self.shared),
            id: Some(id),
        }
    }
}

async fn write_loop<W>(
    mut frames: mpsc::UnboundedReceiver<Frame>,
    mut sink: FramedWrite<W, FrameCodec>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if let Err(err) = sink.send(frame).await {
            warn!(error = %err, "frame write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<R>(
    frames: FramedRead<R, FrameCodec>,
    registry: Arc<CodecRegistry>,
    methods: Arc<Methods>,
    shared: Arc<Shared>,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut decoder = Decoder::new(frames, registry);
    loop {
        match decoder.next_value().await {
            Ok(Some(value)) => handle_incoming(value, &methods, &shared),
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "terminating peer on protocol error");
                break;
            }
        }
    }
    shared.finish_close();
}

fn handle_incoming(value: Value, methods: &Arc<Methods>, shared: &Arc<Shared>) {
    match Envelope::from_value(value) {
        Ok(Envelope::Request(request)) => dispatch_request(request, methods, shared),
        Ok(Envelope::Response(response)) => {
            resolve(shared, response.request_id, Ok(response.payload))
        }
        Ok(Envelope::Error(error)) => resolve(shared, error.request_id, Err(error.error)),
        Err(other) => {
            warn!(value = ?other, "ignoring non-envelope value");
        }
    }
}

fn resolve(shared: &Shared, request_id: u32, outcome: Result<Value, Value>) {
    match shared.calls.lock().free(request_id) {
        Some(slot) => {
            let _ = slot.send(outcome);
        }
        None => warn!(request_id, "reply for unknown call id"),
    }
}

fn dispatch_request(request: Request, methods: &Arc<Methods>, shared: &Arc<Shared>) {
    let request_id = request.request_id;

    let call = match RpcCall::from_value(request.payload) {
        Ok(call) => call,
        Err(_) => {
            warn!(request_id, "request payload is not a call");
            reply(shared, request_id, Err(Value::from("malformed call payload")));
            return;
        }
    };

    let handler = match methods.lookup(&call.topics) {
        Ok(handler) => handler,
        Err(err) => {
            debug!(request_id, path = %call.topics.join("."), "method not found");
            reply(shared, request_id, Err(Value::from(err.to_string())));
            return;
        }
    };

    // Handlers run concurrently; a slow method never blocks the read
    // loop or other requests.
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let outcome = handler.call(call.args).await;
        reply(&shared, request_id, outcome);
    });
}

fn reply(shared: &Shared, request_id: u32, outcome: Result<Value, Value>) {
    let envelope = match outcome {
        Ok(payload) => Response::new(request_id, payload).into_value(),
        Err(error) => ErrorEnvelope::new(request_id, error).into_value(),
    };
    if let Err(err) = shared.send_value(envelope) {
        debug!(request_id, error = %err, "reply not delivered");
    }
}
