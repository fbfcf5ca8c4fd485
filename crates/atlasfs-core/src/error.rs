//! Error types shared across atlasfs components
//!
//! Two layers of failure cross the wire. [`RpcError`] covers the transport
//! itself: connection and framing failures, unresolvable methods, invalid
//! interface descriptors, lifecycle misuse. [`FsError`] is the error a
//! remote filesystem method declares; when a server-side method fails, the
//! error is marshalled into the reply and re-raised with the same kind at
//! the caller. Both therefore derive `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::PathError;

/// Transport-level errors of the RPC layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcError {
    /// Any I/O, connect, serialization, or framing failure on the channel.
    /// The message names the underlying cause.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The method name and parameter types did not resolve on the server's
    /// interface descriptor.
    #[error("no such method: {0}")]
    NoSuchMethod(String),

    /// The supplied interface descriptor is not a valid remote interface.
    #[error("not a remote interface: {0}")]
    BadInterface(String),

    /// Lifecycle violation: double-start, stub against an unbound skeleton.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Errors declared by the remote filesystem interfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsError {
    /// The path does not exist, or is the wrong kind for the operation.
    #[error("not found: {0}")]
    NotFound(String),

    /// A malformed path or path component.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Duplicate registration, no storage servers available, and similar
    /// state violations.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A byte range that falls outside the file.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A local disk failure on a storage server.
    #[error("i/o failure: {0}")]
    Io(String),

    /// The call never completed; the transport reports why.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<PathError> for FsError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::NotFound(_) => FsError::NotFound(err.to_string()),
            PathError::Io(_) => FsError::Io(err.to_string()),
            _ => FsError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_round_trip() {
        let errors = [
            FsError::NotFound("/a".into()),
            FsError::OutOfRange("read past end".into()),
            FsError::Rpc(RpcError::Transport("connection refused".into())),
        ];
        for err in errors {
            let bytes = bincode::serialize(&err).unwrap();
            let decoded: FsError = bincode::deserialize(&bytes).unwrap();
            assert_eq!(decoded, err);
        }
    }

    #[test]
    fn test_path_error_kinds() {
        assert!(matches!(
            FsError::from(PathError::NotFound("/x".into())),
            FsError::NotFound(_)
        ));
        assert!(matches!(
            FsError::from(PathError::Root("parent")),
            FsError::InvalidArgument(_)
        ));
        assert!(matches!(
            FsError::from(PathError::NotADirectory("/x".into())),
            FsError::InvalidArgument(_)
        ));
    }
}
