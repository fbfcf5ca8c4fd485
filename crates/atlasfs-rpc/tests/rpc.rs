//! Loopback tests for the RPC transport.
//!
//! A scratch `Echo` interface is served by a skeleton on an ephemeral port
//! and invoked through stubs over real sockets.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use atlasfs_core::wire::{TypeTag, Value};
use atlasfs_core::{FsError, RpcError};
use atlasfs_rpc::{
    InterfaceDescriptor, InvokeError, RemoteObject, Skeleton, SkeletonEvents, Stub,
};

fn echo_interface() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Echo")
        .method("echo", &[TypeTag::Str], TypeTag::Str)
        .method("reject", &[TypeTag::Str], TypeTag::Unit)
}

struct EchoServer;

#[async_trait]
impl RemoteObject for EchoServer {
    async fn invoke(&self, method: &str, mut args: Vec<Value>) -> Result<Value, InvokeError> {
        match method {
            "echo" => match args.pop() {
                Some(Value::Str(text)) => Ok(Value::Str(text)),
                other => Err(InvokeError::Plumbing(format!(
                    "echo takes one string, got {other:?}"
                ))),
            },
            "reject" => match args.pop() {
                Some(Value::Str(reason)) => Err(InvokeError::Thrown(FsError::NotFound(reason))),
                other => Err(InvokeError::Plumbing(format!(
                    "reject takes one string, got {other:?}"
                ))),
            },
            other => Err(InvokeError::Plumbing(format!("no method {other}"))),
        }
    }
}

fn loopback() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

async fn started_skeleton() -> Skeleton {
    let skeleton =
        Skeleton::with_address(echo_interface(), Arc::new(EchoServer), loopback()).unwrap();
    skeleton.start().await.unwrap();
    skeleton
}

#[tokio::test]
async fn test_round_trip() {
    let skeleton = started_skeleton().await;
    let stub = Stub::for_skeleton(echo_interface(), &skeleton).unwrap();

    let reply = stub
        .call("echo", vec![Value::Str("hello atlas".into())])
        .await
        .unwrap();
    assert_eq!(reply.into_str().unwrap(), "hello atlas");

    skeleton.stop().await;
}

#[tokio::test]
async fn test_thrown_error_keeps_its_kind() {
    let skeleton = started_skeleton().await;
    let stub = Stub::for_skeleton(echo_interface(), &skeleton).unwrap();

    let err = stub
        .call("reject", vec![Value::Str("/missing".into())])
        .await
        .unwrap_err();
    assert_eq!(err, FsError::NotFound("/missing".into()));

    skeleton.stop().await;
}

#[tokio::test]
async fn test_no_such_method() {
    let skeleton = started_skeleton().await;

    // The client believes the interface has one more method than the
    // server's descriptor declares.
    let client_iface = echo_interface().method("missing", &[], TypeTag::Unit);
    let stub = Stub::for_skeleton(client_iface, &skeleton).unwrap();

    let err = stub.call("missing", vec![]).await.unwrap_err();
    assert!(matches!(err, FsError::Rpc(RpcError::NoSuchMethod(_))));

    skeleton.stop().await;
}

#[tokio::test]
async fn test_dead_endpoint_is_a_transport_error() {
    // Bind and immediately drop a listener to get a port nobody serves.
    let listener = tokio::net::TcpListener::bind(loopback()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let stub = Stub::new(echo_interface(), addr.to_string()).unwrap();
    let err = stub.call("echo", vec![Value::Str("x".into())]).await.unwrap_err();
    assert!(matches!(err, FsError::Rpc(RpcError::Transport(_))));
}

#[tokio::test]
async fn test_stub_against_unbound_skeleton() {
    let skeleton = Skeleton::new(echo_interface(), Arc::new(EchoServer)).unwrap();
    assert!(matches!(
        Stub::for_skeleton(echo_interface(), &skeleton),
        Err(RpcError::IllegalState(_))
    ));

    // Once started, the learned address works.
    skeleton.start().await.unwrap();
    assert!(Stub::for_skeleton(echo_interface(), &skeleton).is_ok());
    skeleton.stop().await;
}

#[tokio::test]
async fn test_with_hostname_rebinds_the_port() {
    let skeleton = started_skeleton().await;
    let port = skeleton.local_addr().unwrap().port();

    let stub = Stub::with_hostname(echo_interface(), &skeleton, "localhost").unwrap();
    assert_eq!(stub.endpoint(), format!("localhost:{port}"));

    let reply = stub.call("echo", vec![Value::Str("via hostname".into())]).await.unwrap();
    assert_eq!(reply.into_str().unwrap(), "via hostname");

    skeleton.stop().await;
}

#[tokio::test]
async fn test_lifecycle() {
    let skeleton = started_skeleton().await;
    let addr = skeleton.local_addr().unwrap();
    assert_ne!(addr.port(), 0);
    assert!(skeleton.is_running());

    // Double start is a lifecycle violation.
    assert!(matches!(
        skeleton.start().await,
        Err(RpcError::IllegalState(_))
    ));

    // Stop joins the listener; a second stop is a no-op.
    skeleton.stop().await;
    assert!(!skeleton.is_running());
    skeleton.stop().await;

    // Restart rebinds the same learned port and serves again.
    skeleton.start().await.unwrap();
    assert_eq!(skeleton.local_addr().unwrap(), addr);

    let stub = Stub::for_skeleton(echo_interface(), &skeleton).unwrap();
    let reply = stub.call("echo", vec![Value::Str("again".into())]).await.unwrap();
    assert_eq!(reply.into_str().unwrap(), "again");

    skeleton.stop().await;
}

#[derive(Default)]
struct CountingEvents {
    service_errors: AtomicUsize,
    stopped: AtomicUsize,
}

impl SkeletonEvents for CountingEvents {
    fn service_error(&self, _error: &RpcError) {
        self.service_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn stopped(&self, _cause: Option<&RpcError>) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_stopped_hook_fires_once() {
    let events = Arc::new(CountingEvents::default());
    let skeleton = Skeleton::with_events(
        echo_interface(),
        Arc::new(EchoServer),
        Some(loopback()),
        events.clone(),
    )
    .unwrap();

    skeleton.start().await.unwrap();
    skeleton.stop().await;
    assert_eq!(events.stopped.load(Ordering::SeqCst), 1);

    // An idempotent stop does not fire the hook again.
    skeleton.stop().await;
    assert_eq!(events.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undecodable_request_fails_that_connection_only() {
    let events = Arc::new(CountingEvents::default());
    let skeleton = Skeleton::with_events(
        echo_interface(),
        Arc::new(EchoServer),
        Some(loopback()),
        events.clone(),
    )
    .unwrap();
    skeleton.start().await.unwrap();
    let addr = skeleton.local_addr().unwrap();

    // A frame length far beyond the limit is rejected before dispatch.
    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    raw.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
    raw.shutdown().await.unwrap();
    drop(raw);

    // The skeleton keeps serving well-formed calls.
    let stub = Stub::for_skeleton(echo_interface(), &skeleton).unwrap();
    let reply = stub.call("echo", vec![Value::Str("still up".into())]).await.unwrap();
    assert_eq!(reply.into_str().unwrap(), "still up");

    for _ in 0..100 {
        if events.service_errors.load(Ordering::SeqCst) >= 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(events.service_errors.load(Ordering::SeqCst) >= 1);

    skeleton.stop().await;
}

#[tokio::test]
async fn test_concurrent_calls() {
    let skeleton = Arc::new(started_skeleton().await);
    let stub = Stub::for_skeleton(echo_interface(), &skeleton).unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let stub = stub.clone();
        tasks.push(tokio::spawn(async move {
            let text = format!("message {i}");
            let reply = stub.call("echo", vec![Value::Str(text.clone())]).await.unwrap();
            assert_eq!(reply.into_str().unwrap(), text);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    skeleton.stop().await;
}
