//! The naming server's client-facing interface.

use std::sync::Arc;

use async_trait::async_trait;

use atlasfs_core::wire::{TypeTag, Value};
use atlasfs_core::{FsError, Path, RpcError, SERVICE_PORT};
use atlasfs_rpc::{InterfaceDescriptor, InvokeError, RemoteObject};

use crate::args::ArgReader;
use crate::storage::StorageStub;

/// Descriptor of the Service interface.
pub fn service_descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Service")
        .method("is_directory", &[TypeTag::Path], TypeTag::Bool)
        .method("list", &[TypeTag::Path], TypeTag::Names)
        .method("create_file", &[TypeTag::Path], TypeTag::Bool)
        .method("create_directory", &[TypeTag::Path], TypeTag::Bool)
        .method("delete", &[TypeTag::Path], TypeTag::Bool)
        .method("get_storage", &[TypeTag::Path], TypeTag::Stub)
}

/// Filesystem operations clients perform against the naming server.
///
/// Paths that do not resolve, or resolve to the wrong kind of node, fail
/// with [`FsError::NotFound`].
#[async_trait]
pub trait Service: Send + Sync {
    /// `true` if `path` names a directory, `false` for a file.
    async fn is_directory(&self, path: &Path) -> Result<bool, FsError>;

    /// The immediate child names of the directory at `path`.
    async fn list(&self, directory: &Path) -> Result<Vec<String>, FsError>;

    /// Creates an empty file on some registered storage server. `false` if
    /// the path already exists or is the root.
    async fn create_file(&self, file: &Path) -> Result<bool, FsError>;

    /// Creates a directory in the namespace. `false` if the path already
    /// exists or is the root.
    async fn create_directory(&self, directory: &Path) -> Result<bool, FsError>;

    /// Deletes the file or subtree at `path`, cascading to the storage
    /// servers that host content under it. `false` for the root.
    async fn delete(&self, path: &Path) -> Result<bool, FsError>;

    /// A byte-I/O stub for one of the servers hosting `file`.
    async fn get_storage(&self, file: &Path) -> Result<StorageStub, FsError>;
}

declare_stub!(
    /// Client proxy for the naming server's Service interface.
    ServiceStub,
    service_descriptor
);

/// Stub for a naming server's Service interface at its well-known port.
pub fn service_stub(hostname: &str) -> Result<ServiceStub, RpcError> {
    ServiceStub::new(format!("{hostname}:{SERVICE_PORT}"))
}

#[async_trait]
impl Service for ServiceStub {
    async fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        self.stub
            .call("is_directory", vec![Value::Path(path.clone())])
            .await?
            .into_bool()
    }

    async fn list(&self, directory: &Path) -> Result<Vec<String>, FsError> {
        self.stub
            .call("list", vec![Value::Path(directory.clone())])
            .await?
            .into_names()
    }

    async fn create_file(&self, file: &Path) -> Result<bool, FsError> {
        self.stub
            .call("create_file", vec![Value::Path(file.clone())])
            .await?
            .into_bool()
    }

    async fn create_directory(&self, directory: &Path) -> Result<bool, FsError> {
        self.stub
            .call("create_directory", vec![Value::Path(directory.clone())])
            .await?
            .into_bool()
    }

    async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        self.stub
            .call("delete", vec![Value::Path(path.clone())])
            .await?
            .into_bool()
    }

    async fn get_storage(&self, file: &Path) -> Result<StorageStub, FsError> {
        let reference = self
            .stub
            .call("get_storage", vec![Value::Path(file.clone())])
            .await?
            .into_stub()?;
        Ok(StorageStub::from_ref(reference)?)
    }
}

/// Adapts any [`Service`] implementation to the transport.
pub struct ServiceDispatcher<S>(pub Arc<S>);

#[async_trait]
impl<S: Service + 'static> RemoteObject for ServiceDispatcher<S> {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let mut args = ArgReader::new(method, args);
        match method {
            "is_directory" => {
                let path = args.path()?;
                Ok(Value::Bool(self.0.is_directory(&path).await?))
            }
            "list" => {
                let directory = args.path()?;
                Ok(Value::Names(self.0.list(&directory).await?))
            }
            "create_file" => {
                let file = args.path()?;
                Ok(Value::Bool(self.0.create_file(&file).await?))
            }
            "create_directory" => {
                let directory = args.path()?;
                Ok(Value::Bool(self.0.create_directory(&directory).await?))
            }
            "delete" => {
                let path = args.path()?;
                Ok(Value::Bool(self.0.delete(&path).await?))
            }
            "get_storage" => {
                let file = args.path()?;
                Ok(Value::Stub(self.0.get_storage(&file).await?.to_ref()))
            }
            other => Err(InvokeError::Plumbing(format!(
                "Service has no method {other:?}"
            ))),
        }
    }
}
