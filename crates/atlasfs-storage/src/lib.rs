//! Atlas storage server
//!
//! A storage server hosts the bytes of the files the naming server maps
//! into the shared namespace. It serves the two capabilities of the
//! protocol over a local directory: [`Storage`](atlasfs_proto::Storage)
//! for offset byte I/O and [`Command`](atlasfs_proto::Command) for
//! mutations driven by the naming server. At startup it announces itself
//! through the naming server's Registration interface.

pub mod server;
pub mod store;

pub use server::StorageServer;
pub use store::DiskStore;
