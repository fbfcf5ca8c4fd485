//! Atlas naming server
//!
//! Each instance of the filesystem is centered on a single naming server.
//! It maintains the directory tree and maps every file to the storage
//! servers hosting that file's bytes; it stores no file data itself.
//!
//! The server speaks two disjoint interfaces over the same tree: clients
//! drive [`Service`](atlasfs_proto::Service) on the well-known service
//! port, and storage servers announce themselves through
//! [`Registration`](atlasfs_proto::Registration) on the registration port.

pub mod server;
pub mod tree;

pub use server::{NamingEvents, NamingServer};
pub use tree::DirectoryTree;
