//! The two capabilities a storage server exposes.
//!
//! `Storage` reads and writes file bytes at offsets; `Command` mutates the
//! server's local tree on the naming server's behalf. A registered server
//! is known to the rest of the system as the pair of both, a
//! [`StorageHandle`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atlasfs_core::wire::{TypeTag, Value};
use atlasfs_core::{FsError, Path};
use atlasfs_rpc::{InterfaceDescriptor, InvokeError, RemoteObject};

use crate::args::ArgReader;

/// Descriptor of the byte-I/O capability.
pub fn storage_descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Storage")
        .method("size", &[TypeTag::Path], TypeTag::U64)
        .method(
            "read",
            &[TypeTag::Path, TypeTag::U64, TypeTag::U64],
            TypeTag::Bytes,
        )
        .method(
            "write",
            &[TypeTag::Path, TypeTag::U64, TypeTag::Bytes],
            TypeTag::Bool,
        )
}

/// Descriptor of the filesystem-mutation capability.
pub fn command_descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Command")
        .method("create", &[TypeTag::Path], TypeTag::Bool)
        .method("delete", &[TypeTag::Path], TypeTag::Bool)
        .method("copy", &[TypeTag::Path, TypeTag::Stub], TypeTag::Bool)
}

/// Byte access to the files a storage server hosts.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Size of `file` in bytes.
    async fn size(&self, file: &Path) -> Result<u64, FsError>;

    /// Reads `length` bytes of `file` starting at `offset`. The whole range
    /// must lie within the file.
    async fn read(&self, file: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError>;

    /// Writes `data` into `file` at `offset`, extending it if needed.
    async fn write(&self, file: &Path, offset: u64, data: Vec<u8>) -> Result<bool, FsError>;
}

/// Mutation of a storage server's local tree, driven by the naming server.
#[async_trait]
pub trait Command: Send + Sync {
    /// Creates `file` (and any missing parent directories). `false` if the
    /// path already exists or is the root.
    async fn create(&self, file: &Path) -> Result<bool, FsError>;

    /// Deletes the file or directory tree at `path`. `false` if nothing is
    /// there or `path` is the root.
    async fn delete(&self, path: &Path) -> Result<bool, FsError>;

    /// Replicates `file` from another storage server's byte capability.
    async fn copy(&self, file: &Path, source: StorageStub) -> Result<bool, FsError>;
}

declare_stub!(
    /// Client proxy for a storage server's byte-I/O capability.
    StorageStub,
    storage_descriptor
);

declare_stub!(
    /// Client proxy for a storage server's mutation capability.
    CommandStub,
    command_descriptor
);

#[async_trait]
impl Storage for StorageStub {
    async fn size(&self, file: &Path) -> Result<u64, FsError> {
        self.stub
            .call("size", vec![Value::Path(file.clone())])
            .await?
            .into_u64()
    }

    async fn read(&self, file: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        self.stub
            .call(
                "read",
                vec![
                    Value::Path(file.clone()),
                    Value::U64(offset),
                    Value::U64(length),
                ],
            )
            .await?
            .into_bytes()
    }

    async fn write(&self, file: &Path, offset: u64, data: Vec<u8>) -> Result<bool, FsError> {
        self.stub
            .call(
                "write",
                vec![
                    Value::Path(file.clone()),
                    Value::U64(offset),
                    Value::Bytes(data),
                ],
            )
            .await?
            .into_bool()
    }
}

#[async_trait]
impl Command for CommandStub {
    async fn create(&self, file: &Path) -> Result<bool, FsError> {
        self.stub
            .call("create", vec![Value::Path(file.clone())])
            .await?
            .into_bool()
    }

    async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        self.stub
            .call("delete", vec![Value::Path(path.clone())])
            .await?
            .into_bool()
    }

    async fn copy(&self, file: &Path, source: StorageStub) -> Result<bool, FsError> {
        self.stub
            .call(
                "copy",
                vec![Value::Path(file.clone()), Value::Stub(source.to_ref())],
            )
            .await?
            .into_bool()
    }
}

/// Adapts any [`Storage`] implementation to the transport.
pub struct StorageDispatcher<S>(pub Arc<S>);

#[async_trait]
impl<S: Storage + 'static> RemoteObject for StorageDispatcher<S> {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let mut args = ArgReader::new(method, args);
        match method {
            "size" => {
                let file = args.path()?;
                Ok(Value::U64(self.0.size(&file).await?))
            }
            "read" => {
                let file = args.path()?;
                let offset = args.u64()?;
                let length = args.u64()?;
                Ok(Value::Bytes(self.0.read(&file, offset, length).await?))
            }
            "write" => {
                let file = args.path()?;
                let offset = args.u64()?;
                let data = args.bytes()?;
                Ok(Value::Bool(self.0.write(&file, offset, data).await?))
            }
            other => Err(InvokeError::Plumbing(format!(
                "Storage has no method {other:?}"
            ))),
        }
    }
}

/// Adapts any [`Command`] implementation to the transport.
pub struct CommandDispatcher<C>(pub Arc<C>);

#[async_trait]
impl<C: Command + 'static> RemoteObject for CommandDispatcher<C> {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let mut args = ArgReader::new(method, args);
        match method {
            "create" => {
                let file = args.path()?;
                Ok(Value::Bool(self.0.create(&file).await?))
            }
            "delete" => {
                let path = args.path()?;
                Ok(Value::Bool(self.0.delete(&path).await?))
            }
            "copy" => {
                let file = args.path()?;
                let source = StorageStub::from_ref(args.stub()?)
                    .map_err(|e| InvokeError::Plumbing(e.to_string()))?;
                Ok(Value::Bool(self.0.copy(&file, source).await?))
            }
            other => Err(InvokeError::Plumbing(format!(
                "Command has no method {other:?}"
            ))),
        }
    }
}

/// A registered storage server: its byte-I/O and command capabilities.
///
/// Two handles are the same server exactly when both endpoints match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageHandle {
    pub storage: StorageStub,
    pub command: CommandStub,
}
