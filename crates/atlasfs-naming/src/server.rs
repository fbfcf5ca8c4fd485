//! The naming server.
//!
//! Composes two skeletons over one [`DirectoryTree`]: clients call the
//! Service interface, storage servers call Registration. The tree sits
//! behind a single coarse lock; outbound calls to storage servers
//! (`Command::create` during file creation, `Command::delete` while a
//! delete cascades) happen only after the lock is released.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{info, warn};

use atlasfs_core::{FsError, NamingConfig, Path, RpcError};
use atlasfs_proto::registration::registration_descriptor;
use atlasfs_proto::service::service_descriptor;
use atlasfs_proto::{
    Command, CommandStub, Registration, RegistrationDispatcher, Service, ServiceDispatcher,
    StorageHandle, StorageStub,
};
use atlasfs_rpc::Skeleton;

use crate::tree::DirectoryTree;

/// Observer hooks for naming-server shutdown.
pub trait NamingEvents: Send + Sync {
    /// Called once both skeletons have stopped: with `None` after an
    /// explicit `stop`, or with the cause of an abnormal shutdown.
    fn stopped(&self, _cause: Option<&RpcError>) {}
}

struct NopEvents;

impl NamingEvents for NopEvents {}

struct Lifecycle {
    running: bool,
    skeletons: Option<(Skeleton, Skeleton)>,
}

/// The naming server: the namespace and the storage-server registry.
pub struct NamingServer {
    config: NamingConfig,
    tree: Mutex<DirectoryTree>,
    registry: Mutex<Vec<StorageHandle>>,
    addrs: Mutex<Option<(SocketAddr, SocketAddr)>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    events: Arc<dyn NamingEvents>,
}

impl NamingServer {
    /// Creates a naming server. It is not started and its namespace is
    /// empty; nothing persists across instances.
    pub fn new(config: NamingConfig) -> Arc<Self> {
        Self::with_events(config, Arc::new(NopEvents))
    }

    /// Creates a naming server with explicit lifecycle hooks.
    pub fn with_events(config: NamingConfig, events: Arc<dyn NamingEvents>) -> Arc<Self> {
        Arc::new(Self {
            config,
            tree: Mutex::new(DirectoryTree::new()),
            registry: Mutex::new(Vec::new()),
            addrs: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                running: false,
                skeletons: None,
            }),
            events,
        })
    }

    /// Starts the Service and Registration skeletons.
    ///
    /// Fails with [`RpcError::IllegalState`] if the server is already
    /// running, and with [`RpcError::Transport`] if either listener cannot
    /// be bound.
    pub async fn start(self: &Arc<Self>) -> Result<(), RpcError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.running {
            return Err(RpcError::IllegalState(
                "naming server is already running".into(),
            ));
        }

        let service = Skeleton::with_address(
            service_descriptor(),
            Arc::new(ServiceDispatcher(self.clone())),
            self.config.service_addr(),
        )?;
        let registration = Skeleton::with_address(
            registration_descriptor(),
            Arc::new(RegistrationDispatcher(self.clone())),
            self.config.registration_addr(),
        )?;

        service.start().await?;
        if let Err(e) = registration.start().await {
            service.stop().await;
            return Err(e);
        }

        if let (Some(service_addr), Some(registration_addr)) =
            (service.local_addr(), registration.local_addr())
        {
            info!(
                "naming server up (service {service_addr}, registration {registration_addr})"
            );
            *self.addrs.lock() = Some((service_addr, registration_addr));
        }

        lifecycle.skeletons = Some((service, registration));
        lifecycle.running = true;
        Ok(())
    }

    /// Stops both skeletons and fires the `stopped` hook. A no-op when the
    /// server is not running. Registered storage servers are kept; the
    /// server may be started again.
    pub async fn stop(&self) {
        let skeletons = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.running = false;
            lifecycle.skeletons.take()
        };
        let Some((service, registration)) = skeletons else {
            return;
        };
        service.stop().await;
        registration.stop().await;
        info!("naming server stopped");
        self.events.stopped(None);
    }

    /// The bound Service endpoint, once started.
    pub fn service_addr(&self) -> Option<SocketAddr> {
        self.addrs.lock().as_ref().map(|(service, _)| *service)
    }

    /// The bound Registration endpoint, once started.
    pub fn registration_addr(&self) -> Option<SocketAddr> {
        self.addrs.lock().as_ref().map(|(_, registration)| *registration)
    }

    /// Number of registered storage servers.
    pub fn storage_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// One registered handle, chosen uniformly at random.
    fn pick_replica(&self) -> Result<StorageHandle, FsError> {
        let registry = self.registry.lock();
        if registry.is_empty() {
            return Err(FsError::IllegalState(
                "no storage servers are registered".into(),
            ));
        }
        let pick = rand::thread_rng().gen_range(0..registry.len());
        Ok(registry[pick].clone())
    }
}

#[async_trait]
impl Service for NamingServer {
    async fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        self.tree.lock().is_directory(path)
    }

    async fn list(&self, directory: &Path) -> Result<Vec<String>, FsError> {
        self.tree.lock().list(directory)
    }

    async fn create_file(&self, file: &Path) -> Result<bool, FsError> {
        if file.is_root() {
            return Ok(false);
        }

        let replica = {
            let mut tree = self.tree.lock();
            // The replica is chosen before the parent is checked, so an
            // empty registry is reported even for unreachable paths.
            let replica = self.pick_replica()?;
            if !tree.is_directory(&file.parent()?)? {
                return Err(FsError::NotFound(format!(
                    "the parent of {file} is not a directory"
                )));
            }
            if !tree.create_file(file, replica.clone())? {
                return Ok(false);
            }
            replica
        };

        // Enact the create on the chosen server; roll the namespace entry
        // back if it refuses or the call fails.
        match replica.command.create(file).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                let _ = self.tree.lock().delete(file);
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "create of {file} on {} failed: {e}",
                    replica.command.endpoint()
                );
                let _ = self.tree.lock().delete(file);
                Ok(false)
            }
        }
    }

    async fn create_directory(&self, directory: &Path) -> Result<bool, FsError> {
        if directory.is_root() {
            return Ok(false);
        }
        let mut tree = self.tree.lock();
        if !tree.is_directory(&directory.parent()?)? {
            return Err(FsError::NotFound(format!(
                "the parent of {directory} is not a directory"
            )));
        }
        tree.create_directory(directory)
    }

    async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }

        // Commit the local removal first, then fan the delete out to every
        // replica that hosted content under the path. Transport failures
        // are logged; they never fail the client's call.
        let handles = self.tree.lock().delete(path)?;
        for handle in handles {
            if let Err(e) = handle.command.delete(path).await {
                warn!(
                    "cascading delete of {path} on {} failed: {e}",
                    handle.command.endpoint()
                );
            }
        }
        Ok(true)
    }

    async fn get_storage(&self, file: &Path) -> Result<StorageStub, FsError> {
        Ok(self.tree.lock().get_storage(file)?.storage)
    }
}

#[async_trait]
impl Registration for NamingServer {
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        let handle = StorageHandle { storage, command };

        {
            let mut registry = self.registry.lock();
            if registry.contains(&handle) {
                return Err(FsError::IllegalState(format!(
                    "storage server {} is already registered",
                    handle.storage.endpoint()
                )));
            }
            registry.push(handle.clone());
        }
        info!(
            "registered storage server {} ({} pre-existing files)",
            handle.storage.endpoint(),
            files.len()
        );

        let mut duplicates = Vec::new();
        let mut tree = self.tree.lock();
        for file in files {
            if file.is_root() {
                continue;
            }
            if !tree.register_recursive(&file, handle.clone()) {
                duplicates.push(file);
            }
        }
        Ok(duplicates)
    }
}
