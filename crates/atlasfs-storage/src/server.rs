//! The storage server.
//!
//! Serves the two capability interfaces over a [`DiskStore`] and handles
//! the registration handshake: announce the capability pair and the files
//! already on disk, then delete whatever the naming server rejected as
//! duplicates, pruning directories the deletions leave empty.
//!
//! Disk work runs on blocking tasks so the service tasks never stall the
//! runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use atlasfs_core::{FsError, Path, RpcError, StorageConfig, COPY_CHUNK_SIZE};
use atlasfs_proto::storage::{command_descriptor, storage_descriptor};
use atlasfs_proto::{
    Command, CommandDispatcher, CommandStub, Registration, RegistrationStub, Storage,
    StorageDispatcher, StorageStub,
};
use atlasfs_rpc::Skeleton;

use crate::store::DiskStore;

/// A storage server rooted at a local directory.
pub struct StorageServer {
    config: StorageConfig,
    store: Arc<DiskStore>,
    addrs: parking_lot::Mutex<Option<(SocketAddr, SocketAddr)>>,
    lifecycle: tokio::sync::Mutex<Option<(Skeleton, Skeleton)>>,
}

impl StorageServer {
    /// Creates a storage server over `config.root`, which must be an
    /// existing directory. The server is not started.
    pub fn new(config: StorageConfig) -> Result<Arc<Self>, FsError> {
        let store = Arc::new(DiskStore::new(&config.root)?);
        Ok(Arc::new(Self {
            config,
            store,
            addrs: parking_lot::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(None),
        }))
    }

    /// Runs a disk operation on a blocking task.
    async fn blocking<T, F>(&self, op: F) -> Result<T, FsError>
    where
        T: Send + 'static,
        F: FnOnce(&DiskStore) -> Result<T, FsError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| FsError::Io(format!("blocking task failed: {e}")))?
    }

    /// Starts both capability skeletons and registers with the naming
    /// server. Paths the naming server reports as duplicates are deleted
    /// locally before the method returns.
    pub async fn start(self: &Arc<Self>) -> Result<(), FsError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Err(RpcError::IllegalState("storage server is already running".into()).into());
        }

        let storage_skeleton = Skeleton::with_address(
            storage_descriptor(),
            Arc::new(StorageDispatcher(self.clone())),
            self.config.storage_addr(),
        )?;
        let command_skeleton = Skeleton::with_address(
            command_descriptor(),
            Arc::new(CommandDispatcher(self.clone())),
            self.config.command_addr(),
        )?;
        storage_skeleton.start().await?;
        if let Err(e) = command_skeleton.start().await {
            storage_skeleton.stop().await;
            return Err(e.into());
        }

        // Advertised endpoints carry the configured host, since the bind
        // address is typically a wildcard.
        let storage_stub = StorageStub::with_hostname(&storage_skeleton, &self.config.advertise_host)?;
        let command_stub = CommandStub::with_hostname(&command_skeleton, &self.config.advertise_host)?;

        let files = self.blocking(|store| Ok(Path::list_files(store.root())?)).await?;
        info!(
            "storage server announcing {} files from {}",
            files.len(),
            self.store.root().display()
        );

        let naming = RegistrationStub::new(self.config.naming_endpoint())?;
        let registered = naming.register(storage_stub, command_stub, files).await;
        let duplicates = match registered {
            Ok(duplicates) => duplicates,
            Err(e) => {
                storage_skeleton.stop().await;
                command_skeleton.stop().await;
                return Err(e);
            }
        };

        for duplicate in duplicates {
            debug!("removing duplicate path {duplicate}");
            self.blocking(move |store| {
                store.delete(&duplicate)?;
                store.prune_empty_dirs(&duplicate)
            })
            .await?;
        }

        if let (Some(storage_addr), Some(command_addr)) =
            (storage_skeleton.local_addr(), command_skeleton.local_addr())
        {
            info!("storage server up (storage {storage_addr}, command {command_addr})");
            *self.addrs.lock() = Some((storage_addr, command_addr));
        }
        *lifecycle = Some((storage_skeleton, command_skeleton));
        Ok(())
    }

    /// Stops both skeletons. A no-op when the server is not running; the
    /// naming server keeps the registration either way.
    pub async fn stop(&self) {
        let skeletons = self.lifecycle.lock().await.take();
        let Some((storage, command)) = skeletons else {
            return;
        };
        storage.stop().await;
        command.stop().await;
        info!("storage server stopped");
    }

    /// The bound Storage endpoint, once started.
    pub fn storage_addr(&self) -> Option<SocketAddr> {
        self.addrs.lock().as_ref().map(|(storage, _)| *storage)
    }

    /// The bound Command endpoint, once started.
    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.addrs.lock().as_ref().map(|(_, command)| *command)
    }
}

#[async_trait]
impl Storage for StorageServer {
    async fn size(&self, file: &Path) -> Result<u64, FsError> {
        let file = file.clone();
        self.blocking(move |store| store.size(&file)).await
    }

    async fn read(&self, file: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let file = file.clone();
        self.blocking(move |store| store.read_at(&file, offset, length))
            .await
    }

    async fn write(&self, file: &Path, offset: u64, data: Vec<u8>) -> Result<bool, FsError> {
        let file = file.clone();
        self.blocking(move |store| {
            store.write_at(&file, offset, &data)?;
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl Command for StorageServer {
    async fn create(&self, file: &Path) -> Result<bool, FsError> {
        let file = file.clone();
        self.blocking(move |store| store.create(&file)).await
    }

    async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        let path = path.clone();
        self.blocking(move |store| store.delete(&path)).await
    }

    async fn copy(&self, file: &Path, source: StorageStub) -> Result<bool, FsError> {
        let total = source.size(file).await?;

        // Replace any previous copy, then pull the bytes chunk by chunk.
        {
            let file = file.clone();
            self.blocking(move |store| {
                store.delete(&file)?;
                store.create(&file)
            })
            .await?;
        }

        let mut offset = 0;
        while offset < total {
            let length = (total - offset).min(COPY_CHUNK_SIZE);
            let data = source.read(file, offset, length).await?;
            let file = file.clone();
            self.blocking(move |store| {
                store.write_at(&file, offset, &data)?;
                Ok(())
            })
            .await?;
            offset += length;
        }
        Ok(true)
    }
}
