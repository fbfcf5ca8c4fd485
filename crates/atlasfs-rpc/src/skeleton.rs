//! RPC skeletons
//!
//! A skeleton is a multithreaded TCP server for one remote interface. When
//! running it owns exactly one listener task; every accepted connection is
//! handed to its own service task, which decodes the request, resolves the
//! method on the interface descriptor, invokes the target object, and
//! writes the reply. Per-connection failures terminate that connection
//! only.
//!
//! The lifecycle is stopped -> running -> stopped and restartable: `stop`
//! wakes the listener, waits for it to exit, and leaves in-flight service
//! tasks to run to completion. Failures in the listener and service tasks
//! are observable through [`SkeletonEvents`].

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use atlasfs_core::wire::{CallReply, CallRequest, Fault, Value};
use atlasfs_core::{FsError, RpcError};

use crate::descriptor::InterfaceDescriptor;
use crate::frame::{recv_frame, send_frame};

/// Failure of one invocation on the target object.
#[derive(Debug)]
pub enum InvokeError {
    /// The method raised its declared error; it is marshalled into the
    /// reply and re-raised at the caller.
    Thrown(FsError),
    /// The invocation plumbing failed (missing or mistyped argument); the
    /// caller sees a transport error.
    Plumbing(String),
}

impl From<FsError> for InvokeError {
    fn from(err: FsError) -> Self {
        InvokeError::Thrown(err)
    }
}

/// The server-object seam: dispatches one decoded call to the object that
/// implements the interface.
#[async_trait]
pub trait RemoteObject: Send + Sync {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError>;
}

/// Hooks for observing skeleton failures and shutdown.
///
/// All default implementations do nothing except `listen_error`, which
/// stops the server.
pub trait SkeletonEvents: Send + Sync {
    /// Called when `accept` fails while the skeleton is not stopping.
    /// Return `true` to resume accepting connections, `false` to shut the
    /// listener down.
    fn listen_error(&self, _error: &std::io::Error) -> bool {
        false
    }

    /// Called when a service task fails at the top level (a request that
    /// could not be read, or a reply that could not be written).
    fn service_error(&self, _error: &RpcError) {}

    /// Called once the listener has exited: with `None` after a normal
    /// `stop`, or with the cause when the listener shut down on its own.
    fn stopped(&self, _cause: Option<&RpcError>) {}
}

struct NopEvents;

impl SkeletonEvents for NopEvents {}

struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A server endpoint bound to a TCP listener, dispatching inbound calls to
/// a target [`RemoteObject`].
pub struct Skeleton {
    iface: Arc<InterfaceDescriptor>,
    target: Arc<dyn RemoteObject>,
    events: Arc<dyn SkeletonEvents>,
    /// Configured at construction or learned at first bind; a learned
    /// system-assigned port is retained so restarts rebind the same one.
    addr: Mutex<Option<SocketAddr>>,
    /// Cleared by the listener task as it exits, whatever the reason.
    running: Arc<AtomicBool>,
    lifecycle: tokio::sync::Mutex<Option<ListenerHandle>>,
}

impl Skeleton {
    /// Creates a skeleton with no initial address; the system assigns a
    /// port at first `start`.
    ///
    /// Fails with [`RpcError::BadInterface`] if the descriptor is not a
    /// valid remote interface.
    pub fn new(
        iface: InterfaceDescriptor,
        target: Arc<dyn RemoteObject>,
    ) -> Result<Self, RpcError> {
        Self::with_events(iface, target, None, Arc::new(NopEvents))
    }

    /// Creates a skeleton with a fixed bind address. A port of 0 still gets
    /// the system-assigned treatment.
    pub fn with_address(
        iface: InterfaceDescriptor,
        target: Arc<dyn RemoteObject>,
        addr: SocketAddr,
    ) -> Result<Self, RpcError> {
        Self::with_events(iface, target, Some(addr), Arc::new(NopEvents))
    }

    /// Creates a skeleton with explicit event hooks.
    pub fn with_events(
        iface: InterfaceDescriptor,
        target: Arc<dyn RemoteObject>,
        addr: Option<SocketAddr>,
        events: Arc<dyn SkeletonEvents>,
    ) -> Result<Self, RpcError> {
        iface.validate()?;
        Ok(Self {
            iface: Arc::new(iface),
            target,
            events,
            addr: Mutex::new(addr),
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: tokio::sync::Mutex::new(None),
        })
    }

    /// The address this skeleton is bound to, once known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr.lock()
    }

    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.iface
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the listener and returns as soon as it is accepting.
    ///
    /// Fails with [`RpcError::IllegalState`] if the skeleton is already
    /// running, and with [`RpcError::Transport`] if the listener cannot be
    /// bound.
    pub async fn start(&self) -> Result<(), RpcError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.running.load(Ordering::SeqCst) {
            return Err(RpcError::IllegalState(format!(
                "skeleton for {} is already running",
                self.iface.name()
            )));
        }
        // A listener that shut down on its own leaves a finished task
        // behind; reap it before rebinding.
        if let Some(old) = lifecycle.take() {
            let _ = old.task.await;
        }

        let bind_addr = self
            .local_addr()
            .unwrap_or_else(|| SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| RpcError::Transport(format!("bind {bind_addr} failed: {e}")))?;
        let local = listener
            .local_addr()
            .map_err(|e| RpcError::Transport(format!("local address unavailable: {e}")))?;
        *self.addr.lock() = Some(local);

        let (shutdown, signal) = watch::channel(false);
        self.running.store(true, Ordering::SeqCst);
        let task = tokio::spawn(listen(
            listener,
            signal,
            self.iface.clone(),
            self.target.clone(),
            self.events.clone(),
            self.running.clone(),
        ));
        *lifecycle = Some(ListenerHandle { shutdown, task });

        debug!("skeleton for {} listening on {local}", self.iface.name());
        Ok(())
    }

    /// Stops the listener and waits for it to exit.
    ///
    /// In-flight service tasks run to completion; they are never joined
    /// here. A no-op when the skeleton is already stopped.
    pub async fn stop(&self) {
        let handle = self.lifecycle.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        // Waking a listener that already exited on its own is harmless.
        let _ = handle.shutdown.send(true);
        let _ = handle.task.await;
    }
}

async fn listen(
    listener: TcpListener,
    mut signal: watch::Receiver<bool>,
    iface: Arc<InterfaceDescriptor>,
    target: Arc<dyn RemoteObject>,
    events: Arc<dyn SkeletonEvents>,
    running: Arc<AtomicBool>,
) {
    let cause = loop {
        tokio::select! {
            _ = signal.changed() => break None,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("accepted connection from {peer}");
                    let iface = iface.clone();
                    let target = target.clone();
                    let events = events.clone();
                    tokio::spawn(serve_connection(stream, iface, target, events));
                }
                Err(e) => {
                    if events.listen_error(&e) {
                        continue;
                    }
                    break Some(RpcError::Transport(format!("accept failed: {e}")));
                }
            }
        }
    };

    running.store(false, Ordering::SeqCst);
    events.stopped(cause.as_ref());
}

async fn serve_connection(
    mut stream: TcpStream,
    iface: Arc<InterfaceDescriptor>,
    target: Arc<dyn RemoteObject>,
    events: Arc<dyn SkeletonEvents>,
) {
    let reply = match recv_frame::<CallRequest>(&mut stream).await {
        Ok(request) => dispatch(&iface, target.as_ref(), request).await,
        Err(e) => {
            events.service_error(&e);
            CallReply::RemoteError(Fault::Transport(e.to_string()))
        }
    };

    if let Err(e) = send_frame(&mut stream, &reply).await {
        events.service_error(&e);
    }
    // The connection closes when the stream drops.
}

async fn dispatch(
    iface: &InterfaceDescriptor,
    target: &dyn RemoteObject,
    request: CallRequest,
) -> CallReply {
    if iface.resolve(&request.method, &request.param_types).is_none() {
        return CallReply::RemoteError(Fault::NoSuchMethod(format!(
            "{}::{}({:?})",
            iface.name(),
            request.method,
            request.param_types
        )));
    }

    match target.invoke(&request.method, request.args).await {
        Ok(value) => CallReply::Ok(value),
        Err(InvokeError::Thrown(err)) => CallReply::RemoteError(Fault::MethodThrew(err)),
        Err(InvokeError::Plumbing(msg)) => CallReply::RemoteError(Fault::Transport(msg)),
    }
}
