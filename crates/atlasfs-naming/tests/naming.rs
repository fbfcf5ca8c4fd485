//! End-to-end tests for the naming server over real sockets.
//!
//! A recording storage server (in-process `Storage` + `Command`
//! implementation behind real skeletons) registers with a naming server on
//! ephemeral ports; clients drive the Service interface through stubs.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use atlasfs_core::{FsError, NamingConfig, Path};
use atlasfs_naming::NamingServer;
use atlasfs_proto::storage::{command_descriptor, storage_descriptor};
use atlasfs_proto::{
    Command, CommandDispatcher, CommandStub, Registration, RegistrationStub, Service, ServiceStub,
    Storage, StorageDispatcher, StorageStub,
};
use atlasfs_rpc::Skeleton;

fn path(text: &str) -> Path {
    Path::parse(text).unwrap()
}

fn ephemeral() -> NamingConfig {
    NamingConfig {
        bind: Ipv4Addr::LOCALHOST.into(),
        service_port: 0,
        registration_port: 0,
    }
}

async fn started_naming() -> (Arc<NamingServer>, ServiceStub, SocketAddr) {
    let server = NamingServer::new(ephemeral());
    server.start().await.unwrap();
    let service = ServiceStub::new(server.service_addr().unwrap().to_string()).unwrap();
    let registration_addr = server.registration_addr().unwrap();
    (server, service, registration_addr)
}

/// In-process storage server that records the commands it receives.
#[derive(Default)]
struct RecordingStore {
    created: Mutex<Vec<Path>>,
    deleted: Mutex<Vec<Path>>,
    refuse_creates: bool,
}

#[async_trait]
impl Storage for RecordingStore {
    async fn size(&self, _file: &Path) -> Result<u64, FsError> {
        Ok(0)
    }

    async fn read(&self, _file: &Path, _offset: u64, _length: u64) -> Result<Vec<u8>, FsError> {
        Ok(Vec::new())
    }

    async fn write(&self, _file: &Path, _offset: u64, _data: Vec<u8>) -> Result<bool, FsError> {
        Ok(true)
    }
}

#[async_trait]
impl Command for RecordingStore {
    async fn create(&self, file: &Path) -> Result<bool, FsError> {
        if self.refuse_creates {
            return Ok(false);
        }
        self.created.lock().push(file.clone());
        Ok(true)
    }

    async fn delete(&self, target: &Path) -> Result<bool, FsError> {
        self.deleted.lock().push(target.clone());
        Ok(true)
    }

    async fn copy(&self, _file: &Path, _source: StorageStub) -> Result<bool, FsError> {
        Ok(true)
    }
}

/// A recording store served over real skeletons and registered with the
/// naming server.
struct MockStorageServer {
    store: Arc<RecordingStore>,
    storage_skeleton: Skeleton,
    command_skeleton: Skeleton,
}

impl MockStorageServer {
    async fn launch(
        registration_addr: SocketAddr,
        files: &[&str],
        store: RecordingStore,
    ) -> Result<Self, FsError> {
        let store = Arc::new(store);
        let loopback: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();

        let storage_skeleton = Skeleton::with_address(
            storage_descriptor(),
            Arc::new(StorageDispatcher(store.clone())),
            loopback,
        )?;
        let command_skeleton = Skeleton::with_address(
            command_descriptor(),
            Arc::new(CommandDispatcher(store.clone())),
            loopback,
        )?;
        storage_skeleton.start().await?;
        command_skeleton.start().await?;

        let registration = RegistrationStub::new(registration_addr.to_string())?;
        let rejected = registration
            .register(
                StorageStub::for_skeleton(&storage_skeleton)?,
                CommandStub::for_skeleton(&command_skeleton)?,
                files.iter().map(|f| path(f)).collect(),
            )
            .await?;
        assert!(rejected.is_empty(), "unexpected duplicates: {rejected:?}");

        Ok(Self {
            store,
            storage_skeleton,
            command_skeleton,
        })
    }

    fn storage_stub(&self) -> StorageStub {
        StorageStub::for_skeleton(&self.storage_skeleton).unwrap()
    }

    async fn shutdown(&self) {
        self.storage_skeleton.stop().await;
        self.command_skeleton.stop().await;
    }
}

#[tokio::test]
async fn test_register_then_browse() {
    let (server, service, registration_addr) = started_naming().await;
    let mock = MockStorageServer::launch(
        registration_addr,
        &["/docs/readme.txt", "/data/a.bin"],
        RecordingStore::default(),
    )
    .await
    .unwrap();

    assert!(service.is_directory(&path("/docs")).await.unwrap());
    assert!(!service.is_directory(&path("/docs/readme.txt")).await.unwrap());
    assert!(matches!(
        service.is_directory(&path("/ghost")).await,
        Err(FsError::NotFound(_))
    ));

    let mut names = service.list(&Path::root()).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["data", "docs"]);

    // The file's replica is the storage stub the mock registered with.
    let replica = service.get_storage(&path("/data/a.bin")).await.unwrap();
    assert_eq!(replica, mock.storage_stub());

    mock.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_create_file_reaches_the_chosen_server() {
    let (server, service, registration_addr) = started_naming().await;
    let mock = MockStorageServer::launch(registration_addr, &[], RecordingStore::default())
        .await
        .unwrap();

    assert!(service.create_directory(&path("/inbox")).await.unwrap());
    assert!(service.create_file(&path("/inbox/new.txt")).await.unwrap());
    assert!(!service.create_file(&path("/inbox/new.txt")).await.unwrap());
    assert_eq!(*mock.store.created.lock(), vec![path("/inbox/new.txt")]);

    assert!(matches!(
        service.create_file(&path("/nowhere/f")).await,
        Err(FsError::NotFound(_))
    ));

    mock.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_create_file_rolls_back_when_storage_refuses() {
    let (server, service, registration_addr) = started_naming().await;
    let mock = MockStorageServer::launch(
        registration_addr,
        &[],
        RecordingStore {
            refuse_creates: true,
            ..RecordingStore::default()
        },
    )
    .await
    .unwrap();

    assert!(!service.create_file(&path("/f")).await.unwrap());
    // The rolled-back entry leaves no trace in the namespace.
    assert!(matches!(
        service.is_directory(&path("/f")).await,
        Err(FsError::NotFound(_))
    ));

    mock.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_path_registration() {
    let (server, _service, registration_addr) = started_naming().await;
    let first = MockStorageServer::launch(
        registration_addr,
        &["/a", "/b"],
        RecordingStore::default(),
    )
    .await
    .unwrap();

    // The second server announces /a again; only /a comes back.
    let store = Arc::new(RecordingStore::default());
    let loopback: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let storage_skeleton = Skeleton::with_address(
        storage_descriptor(),
        Arc::new(StorageDispatcher(store.clone())),
        loopback,
    )
    .unwrap();
    let command_skeleton = Skeleton::with_address(
        command_descriptor(),
        Arc::new(CommandDispatcher(store)),
        loopback,
    )
    .unwrap();
    storage_skeleton.start().await.unwrap();
    command_skeleton.start().await.unwrap();

    let registration = RegistrationStub::new(registration_addr.to_string()).unwrap();
    let storage_stub = StorageStub::for_skeleton(&storage_skeleton).unwrap();
    let command_stub = CommandStub::for_skeleton(&command_skeleton).unwrap();
    let rejected = registration
        .register(
            storage_stub.clone(),
            command_stub.clone(),
            vec![path("/a"), path("/c")],
        )
        .await
        .unwrap();
    assert_eq!(rejected, vec![path("/a")]);

    // Registering the same capability pair twice is a state violation.
    assert!(matches!(
        registration
            .register(storage_stub, command_stub, vec![])
            .await,
        Err(FsError::IllegalState(_))
    ));

    storage_skeleton.stop().await;
    command_skeleton.stop().await;
    first.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_delete_cascades_to_every_replica() {
    let (server, service, registration_addr) = started_naming().await;
    let one = MockStorageServer::launch(registration_addr, &["/d/x"], RecordingStore::default())
        .await
        .unwrap();
    let two = MockStorageServer::launch(registration_addr, &["/d/y"], RecordingStore::default())
        .await
        .unwrap();

    assert!(service.delete(&path("/d")).await.unwrap());
    assert!(matches!(
        service.is_directory(&path("/d")).await,
        Err(FsError::NotFound(_))
    ));

    // Both hosts saw the delete for the subtree they held content under.
    assert_eq!(*one.store.deleted.lock(), vec![path("/d")]);
    assert_eq!(*two.store.deleted.lock(), vec![path("/d")]);

    assert!(matches!(
        service.delete(&path("/d")).await,
        Err(FsError::NotFound(_))
    ));

    one.shutdown().await;
    two.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_create_has_one_winner() {
    let (server, _service, registration_addr) = started_naming().await;
    let mock = MockStorageServer::launch(registration_addr, &[], RecordingStore::default())
        .await
        .unwrap();

    let service_addr = server.service_addr().unwrap().to_string();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let endpoint = service_addr.clone();
        tasks.push(tokio::spawn(async move {
            let stub = ServiceStub::new(endpoint).unwrap();
            stub.create_file(&path("/contested")).await.unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    // Exactly one file node exists, backed by exactly one create.
    let stub = ServiceStub::new(service_addr).unwrap();
    assert!(!stub.is_directory(&path("/contested")).await.unwrap());
    assert_eq!(*mock.store.created.lock(), vec![path("/contested")]);

    mock.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_naming_lifecycle() {
    let server = NamingServer::new(ephemeral());
    server.start().await.unwrap();
    assert!(matches!(
        server.start().await,
        Err(atlasfs_core::RpcError::IllegalState(_))
    ));

    let addr = server.service_addr().unwrap();
    server.stop().await;
    server.stop().await; // idempotent

    // A stopped server refuses calls, then serves again after a restart.
    let stub = ServiceStub::new(addr.to_string()).unwrap();
    assert!(stub.is_directory(&Path::root()).await.is_err());

    server.start().await.unwrap();
    let stub = ServiceStub::new(server.service_addr().unwrap().to_string()).unwrap();
    assert!(stub.is_directory(&Path::root()).await.unwrap());
    server.stop().await;
}
