//! Atlas remote interfaces
//!
//! The four interfaces the filesystem's components expose to each other,
//! shared by every crate that speaks the protocol:
//!
//! - [`Service`]: the naming server's client-facing operations.
//! - [`Registration`]: the naming server's storage-server-facing
//!   operation.
//! - [`Storage`]: a storage server's byte I/O capability.
//! - [`Command`]: a storage server's filesystem-mutation capability.
//!
//! Each interface comes in three concrete pieces: an `#[async_trait]`
//! trait implemented by the real server object, a typed stub implementing
//! the same trait over the network, and a dispatcher adapting any
//! implementation to the transport's [`RemoteObject`] seam with a
//! hand-rolled match on the method name.
//!
//! [`RemoteObject`]: atlasfs_rpc::RemoteObject

#[macro_use]
mod macros;

mod args;
pub mod registration;
pub mod service;
pub mod storage;

pub use registration::{registration_stub, Registration, RegistrationDispatcher, RegistrationStub};
pub use service::{service_stub, Service, ServiceDispatcher, ServiceStub};
pub use storage::{
    Command, CommandDispatcher, CommandStub, Storage, StorageDispatcher, StorageHandle,
    StorageStub,
};
