//! Atlas RPC transport
//!
//! A remote method call travels as one request frame and one reply frame
//! over a fresh TCP connection. The two halves:
//!
//! - [`Stub`]: the client proxy. Holds an interface descriptor and an
//!   endpoint; each call connects, writes the method name, parameter type
//!   descriptors, and arguments, then reads the reply.
//! - [`Skeleton`]: the server endpoint. One listener task accepts
//!   connections; each connection gets its own service task that decodes
//!   the request, resolves the method on the interface descriptor, invokes
//!   the target object, and writes the reply.
//!
//! Interfaces are first-class runtime values ([`InterfaceDescriptor`]):
//! a set of named operations with parameter-type lists and return types.
//! A descriptor is only *remote* when every operation declares that it may
//! fail with a transport error; both halves validate this at construction.

pub mod descriptor;
pub mod frame;
pub mod skeleton;
pub mod stub;

pub use descriptor::{InterfaceDescriptor, MethodDef};
pub use skeleton::{InvokeError, RemoteObject, Skeleton, SkeletonEvents};
pub use stub::Stub;
