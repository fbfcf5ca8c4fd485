//! Atlas core - shared types for the distributed filesystem
//!
//! This crate contains the types every atlasfs component exchanges: the
//! `Path` value type, the self-describing wire values and call frames, the
//! error kinds that cross the network, and the TOML configuration.
//! It has no dependency on networking code.

pub mod config;
pub mod error;
pub mod path;
pub mod wire;

pub use config::{Config, NamingConfig, StorageConfig};
pub use error::{FsError, RpcError};
pub use path::{Path, PathError};
pub use wire::{CallReply, CallRequest, Fault, StubRef, TypeTag, Value};

/// Well-known port of the naming server's client interface
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the naming server's storage-server interface
pub const REGISTRATION_PORT: u16 = 6001;

/// Maximum frame size (8 MB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Chunk size for server-to-server file copies (128 KB)
pub const COPY_CHUNK_SIZE: u64 = 128 * 1024;
