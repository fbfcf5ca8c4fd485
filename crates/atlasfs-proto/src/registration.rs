//! The naming server's storage-server-facing interface.

use std::sync::Arc;

use async_trait::async_trait;

use atlasfs_core::wire::{TypeTag, Value};
use atlasfs_core::{FsError, Path, RpcError, REGISTRATION_PORT};
use atlasfs_rpc::{InterfaceDescriptor, InvokeError, RemoteObject};

use crate::args::ArgReader;
use crate::storage::{CommandStub, StorageStub};

/// Descriptor of the Registration interface.
pub fn registration_descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Registration").method(
        "register",
        &[TypeTag::Stub, TypeTag::Stub, TypeTag::Paths],
        TypeTag::Paths,
    )
}

/// How a storage server announces itself to the naming server.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Registers the capability pair and the files the server already
    /// hosts. The reply lists the paths the naming server rejected as
    /// duplicates; the storage server is expected to delete those locally.
    ///
    /// Registering the same pair twice fails with
    /// [`FsError::IllegalState`].
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError>;
}

declare_stub!(
    /// Client proxy for the naming server's Registration interface.
    RegistrationStub,
    registration_descriptor
);

/// Stub for a naming server's Registration interface at its well-known
/// port.
pub fn registration_stub(hostname: &str) -> Result<RegistrationStub, RpcError> {
    RegistrationStub::new(format!("{hostname}:{REGISTRATION_PORT}"))
}

#[async_trait]
impl Registration for RegistrationStub {
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        self.stub
            .call(
                "register",
                vec![
                    Value::Stub(storage.to_ref()),
                    Value::Stub(command.to_ref()),
                    Value::Paths(files),
                ],
            )
            .await?
            .into_paths()
    }
}

/// Adapts any [`Registration`] implementation to the transport.
pub struct RegistrationDispatcher<R>(pub Arc<R>);

#[async_trait]
impl<R: Registration + 'static> RemoteObject for RegistrationDispatcher<R> {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let mut args = ArgReader::new(method, args);
        match method {
            "register" => {
                let storage = StorageStub::from_ref(args.stub()?)
                    .map_err(|e| InvokeError::Plumbing(e.to_string()))?;
                let command = CommandStub::from_ref(args.stub()?)
                    .map_err(|e| InvokeError::Plumbing(e.to_string()))?;
                let files = args.paths()?;
                Ok(Value::Paths(
                    self.0.register(storage, command, files).await?,
                ))
            }
            other => Err(InvokeError::Plumbing(format!(
                "Registration has no method {other:?}"
            ))),
        }
    }
}
