//! Two peers over an in-memory duplex channel: one exposes an echo
//! method and a streaming upload, the other calls both.
//!
//! Run with:
//!   cargo run --example echo

use std::sync::Arc;

use streamrpc::logging::{init_logging, LogFormat, LogLevel};
use streamrpc::{ByteStream, CodecRegistry, Methods, PeerConfig, RpcPeer, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text, LogLevel::Debug);

    let registry = Arc::new(CodecRegistry::standard());
    let (server_end, client_end) = tokio::io::duplex(4096);

    let methods = Methods::new()
        .expose("echo", |mut args: Vec<Value>| async move {
            Ok(args.pop().unwrap_or(Value::Null))
        })
        .expose("upload", |mut args: Vec<Value>| async move {
            let Some(Value::Stream(stream)) = args.pop() else {
                return Err(Value::from("upload expects a byte stream"));
            };
            let body = stream.collect_bytes().await;
            eprintln!("server received {} streamed bytes", body.len());
            Ok(Value::from(body.len() as f64))
        });

    let (sr, sw) = tokio::io::split(server_end);
    let _server = RpcPeer::spawn(sr, sw, methods, Arc::clone(&registry), PeerConfig::default());

    let (cr, cw) = tokio::io::split(client_end);
    let client = RpcPeer::spawn(cr, cw, Methods::new(), registry, PeerConfig::default());

    let reply = client.call("echo", vec![Value::from("hello")]).await?;
    eprintln!("echo replied: {reply:?}");

    let stream = ByteStream::from_chunks([
        bytes::Bytes::from_static(b"streamed "),
        bytes::Bytes::from_static(b"payload"),
    ]);
    let reply = client.call("upload", vec![Value::Stream(stream)]).await?;
    eprintln!("upload replied: {reply:?}");

    client.close();
    Ok(())
}
