//! End-to-end coverage: two peers over an in-memory duplex channel.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use streamrpc::{ByteStream, CodecRegistry, Methods, PeerConfig, RpcError, RpcPeer, Value};

fn connect(a_methods: Methods, b_methods: Methods) -> (RpcPeer, RpcPeer) {
    let registry = Arc::new(CodecRegistry::standard());
    let (a_end, b_end) = tokio::io::duplex(4096);
    let (ar, aw) = tokio::io::split(a_end);
    let (br, bw) = tokio::io::split(b_end);
    let a = RpcPeer::spawn(ar, aw, a_methods, Arc::clone(&registry), PeerConfig::default());
    let b = RpcPeer::spawn(br, bw, b_methods, registry, PeerConfig::default());
    (a, b)
}

fn echo_methods() -> Methods {
    Methods::new().expose("echo", |mut args: Vec<Value>| async move {
        Ok(args.pop().unwrap_or(Value::Null))
    })
}

#[tokio::test]
async fn echo_roundtrip() {
    let (caller, _callee) = connect(Methods::new(), echo_methods());

    let reply = caller
        .call("echo", vec![Value::from("hello")])
        .await
        .unwrap();
    assert_eq!(reply, Value::from("hello"));
}

#[tokio::test]
async fn structured_arguments_roundtrip() {
    let (caller, _callee) = connect(Methods::new(), echo_methods());

    let reply = caller
        .call(
            "echo",
            vec![Value::object([
                ("name", Value::from("streamrpc")),
                ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
                ("count", Value::from(2)),
            ])],
        )
        .await
        .unwrap();

    assert_eq!(
        reply,
        Value::object([
            ("name", Value::from("streamrpc")),
            ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
            ("count", Value::from(2)),
        ])
    );
}

#[tokio::test]
async fn streamed_argument_reaches_the_handler() {
    let sink = Methods::new().expose("upload", |mut args: Vec<Value>| async move {
        let Some(Value::Stream(stream)) = args.pop() else {
            return Err(Value::from("expected a stream"));
        };
        let body = stream.collect_bytes().await;
        Ok(Value::from(body.len() as f64))
    });
    let (caller, _callee) = connect(Methods::new(), sink);

    let stream = ByteStream::from_chunks([
        Bytes::from_static(b"chunk one "),
        Bytes::from_static(b"chunk two"),
    ]);
    let reply = caller
        .call("upload", vec![Value::Stream(stream)])
        .await
        .unwrap();
    assert_eq!(reply, Value::from(19.0));
}

#[tokio::test]
async fn streamed_response_reaches_the_caller() {
    let source = Methods::new().expose("download", |_args: Vec<Value>| async move {
        let stream = ByteStream::from_chunks([
            Bytes::from_static(b"first,"),
            Bytes::from_static(b"second"),
        ]);
        Ok(Value::Stream(stream))
    });
    let (caller, _callee) = connect(Methods::new(), source);

    let reply = caller.call("download", vec![]).await.unwrap();
    let Value::Stream(stream) = reply else {
        panic!("expected a stream reply");
    };
    assert_eq!(stream.collect_bytes().await.as_ref(), b"first,second");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_call_does_not_block_fast_call() {
    let methods = Methods::new()
        .expose("slow", |_args: Vec<Value>| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Value::from("slow"))
        })
        .expose("fast", |_args: Vec<Value>| async move {
            Ok(Value::from("fast"))
        });
    let (caller, _callee) = connect(Methods::new(), methods);

    let slow = caller.call("slow", vec![]);
    let fast = async {
        // Issue after the slow call is already on the wire.
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.call("fast", vec![]).await
    };

    let started = std::time::Instant::now();
    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(slow.unwrap(), Value::from("slow"));
    assert_eq!(fast.unwrap(), Value::from("fast"));
    // Total is one slow call, not slow + fast serialized.
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn both_directions_serve() {
    let (a, b) = connect(
        Methods::new().expose("side", |_args: Vec<Value>| async { Ok(Value::from("a")) }),
        Methods::new().expose("side", |_args: Vec<Value>| async { Ok(Value::from("b")) }),
    );

    assert_eq!(a.call("side", vec![]).await.unwrap(), Value::from("b"));
    assert_eq!(b.call("side", vec![]).await.unwrap(), Value::from("a"));
}

#[tokio::test]
async fn close_rejects_new_calls_and_notifies_the_remote() {
    let (a, b) = connect(Methods::new(), echo_methods());

    let (tx, remote_closed) = tokio::sync::oneshot::channel();
    let _guard = b.on_close(move || {
        let _ = tx.send(());
    });

    a.close();
    assert!(matches!(
        a.call("echo", vec![]).await.unwrap_err(),
        RpcError::ChannelClosed
    ));

    remote_closed.await.unwrap();
    assert!(b.closed());
}
