//! RPC stubs
//!
//! A stub is the client half of a remote interface: a validated descriptor
//! plus the server's endpoint. It is stateless apart from that
//! configuration; every method invocation opens a fresh TCP connection,
//! performs one call, and closes it. Nothing is retried.
//!
//! Equality, hashing, and printing never touch the network: two stubs are
//! equal when they reference the same interface and the same endpoint, and
//! would therefore connect to the same skeleton.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::net::TcpStream;

use atlasfs_core::wire::{CallReply, CallRequest, Fault, StubRef, Value};
use atlasfs_core::{FsError, RpcError};

use crate::descriptor::InterfaceDescriptor;
use crate::frame::{recv_frame, send_frame};
use crate::skeleton::Skeleton;

/// A client-side proxy for one remote interface at one endpoint.
#[derive(Clone)]
pub struct Stub {
    iface: Arc<InterfaceDescriptor>,
    endpoint: String,
}

impl Stub {
    /// Creates a stub for a server at `endpoint` (`host:port`).
    ///
    /// Fails with [`RpcError::BadInterface`] if the descriptor is not a
    /// valid remote interface.
    pub fn new(iface: InterfaceDescriptor, endpoint: impl Into<String>) -> Result<Self, RpcError> {
        iface.validate()?;
        Ok(Self {
            iface: Arc::new(iface),
            endpoint: endpoint.into(),
        })
    }

    /// Creates a stub addressing `skeleton`'s bound endpoint.
    ///
    /// Fails with [`RpcError::IllegalState`] if the skeleton has never been
    /// assigned an address.
    pub fn for_skeleton(
        iface: InterfaceDescriptor,
        skeleton: &Skeleton,
    ) -> Result<Self, RpcError> {
        let addr = skeleton.local_addr().ok_or_else(|| {
            RpcError::IllegalState("skeleton has not been assigned an address".into())
        })?;
        Self::new(iface, addr.to_string())
    }

    /// Creates a stub for `skeleton`'s port on an externally supplied host.
    ///
    /// Useful when the skeleton's own bind address is not routable from the
    /// stub's eventual user.
    pub fn with_hostname(
        iface: InterfaceDescriptor,
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RpcError> {
        let addr = skeleton.local_addr().ok_or_else(|| {
            RpcError::IllegalState("skeleton has not been assigned an address".into())
        })?;
        Self::new(iface, format!("{}:{}", hostname, addr.port()))
    }

    /// Rebuilds a stub from its wire identity.
    ///
    /// Fails with [`RpcError::BadInterface`] if the reference names a
    /// different interface than `iface`.
    pub fn from_ref(iface: InterfaceDescriptor, reference: StubRef) -> Result<Self, RpcError> {
        if reference.interface != iface.name() {
            return Err(RpcError::BadInterface(format!(
                "stub reference is for {:?}, expected {:?}",
                reference.interface,
                iface.name()
            )));
        }
        Self::new(iface, reference.endpoint)
    }

    /// This stub's wire identity.
    pub fn to_ref(&self) -> StubRef {
        StubRef {
            interface: self.iface.name().to_string(),
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.iface
    }

    /// Performs one remote call: fresh connection, one request, one reply.
    ///
    /// A `MethodThrew` fault re-raises the method's own error; every other
    /// failure surfaces as an [`RpcError`] at this call site.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, FsError> {
        let def = self.iface.get(method).ok_or_else(|| {
            RpcError::NoSuchMethod(format!("{}::{}", self.iface.name(), method))
        })?;
        if args.len() != def.params.len() {
            return Err(RpcError::Transport(format!(
                "{}::{} takes {} arguments, got {}",
                self.iface.name(),
                method,
                def.params.len(),
                args.len()
            ))
            .into());
        }

        let mut stream = TcpStream::connect(&self.endpoint).await.map_err(|e| {
            RpcError::Transport(format!("connect to {} failed: {e}", self.endpoint))
        })?;

        let request = CallRequest {
            method: method.to_owned(),
            param_types: def.params.clone(),
            args,
        };
        send_frame(&mut stream, &request).await?;
        let reply: CallReply = recv_frame(&mut stream).await?;

        match reply {
            CallReply::Ok(value) => Ok(value),
            CallReply::RemoteError(Fault::MethodThrew(err)) => Err(err),
            CallReply::RemoteError(Fault::NoSuchMethod(msg)) => {
                Err(RpcError::NoSuchMethod(msg).into())
            }
            CallReply::RemoteError(Fault::Transport(msg)) => {
                Err(RpcError::Transport(msg).into())
            }
        }
    }
}

impl PartialEq for Stub {
    fn eq(&self, other: &Self) -> bool {
        self.iface.name() == other.iface.name() && self.endpoint == other.endpoint
    }
}

impl Eq for Stub {}

impl Hash for Stub {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.iface.name().hash(state);
        self.endpoint.hash(state);
    }
}

impl fmt::Display for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_ref(), f)
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("interface", &self.iface.name())
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
