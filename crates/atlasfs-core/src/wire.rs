//! Wire protocol definitions
//!
//! Every remote call is one request frame and one reply frame over a fresh
//! TCP connection. Frames are bincode-serialized and prefixed with a 4-byte
//! little-endian length.
//!
//! The payload is self-describing: a [`CallRequest`] carries the method
//! name, the parameter type descriptors, and the marshalled arguments, in
//! that order. The reply is either `Ok` with the return value or
//! `RemoteError` with a [`Fault`] describing what went wrong on the server
//! side.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FsError;
use crate::path::Path;

/// Type identifiers for marshalled values; also used as parameter type
/// descriptors during method resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Unit,
    Bool,
    U64,
    Bytes,
    Str,
    Names,
    Path,
    Paths,
    Stub,
}

/// The serializable identity of a stub: interface name plus endpoint.
///
/// Stubs travel the wire in this form; the receiving side rebuilds a typed
/// stub around it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StubRef {
    pub interface: String,
    pub endpoint: String,
}

impl fmt::Display for StubRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Remote Interface: {}", self.interface)?;
        writeln!(f, "Remote Address: {}", self.endpoint)
    }
}

/// A marshalled value, one variant per [`TypeTag`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Unit,
    Bool(bool),
    U64(u64),
    Bytes(Vec<u8>),
    Str(String),
    Names(Vec<String>),
    Path(Path),
    Paths(Vec<Path>),
    Stub(StubRef),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Unit => TypeTag::Unit,
            Value::Bool(_) => TypeTag::Bool,
            Value::U64(_) => TypeTag::U64,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Str(_) => TypeTag::Str,
            Value::Names(_) => TypeTag::Names,
            Value::Path(_) => TypeTag::Path,
            Value::Paths(_) => TypeTag::Paths,
            Value::Stub(_) => TypeTag::Stub,
        }
    }

    pub fn into_unit(self) -> Result<(), FsError> {
        match self {
            Value::Unit => Ok(()),
            other => Err(reply_mismatch(TypeTag::Unit, &other)),
        }
    }

    pub fn into_bool(self) -> Result<bool, FsError> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(reply_mismatch(TypeTag::Bool, &other)),
        }
    }

    pub fn into_u64(self) -> Result<u64, FsError> {
        match self {
            Value::U64(n) => Ok(n),
            other => Err(reply_mismatch(TypeTag::U64, &other)),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, FsError> {
        match self {
            Value::Bytes(data) => Ok(data),
            other => Err(reply_mismatch(TypeTag::Bytes, &other)),
        }
    }

    pub fn into_str(self) -> Result<String, FsError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(reply_mismatch(TypeTag::Str, &other)),
        }
    }

    pub fn into_names(self) -> Result<Vec<String>, FsError> {
        match self {
            Value::Names(names) => Ok(names),
            other => Err(reply_mismatch(TypeTag::Names, &other)),
        }
    }

    pub fn into_path(self) -> Result<Path, FsError> {
        match self {
            Value::Path(path) => Ok(path),
            other => Err(reply_mismatch(TypeTag::Path, &other)),
        }
    }

    pub fn into_paths(self) -> Result<Vec<Path>, FsError> {
        match self {
            Value::Paths(paths) => Ok(paths),
            other => Err(reply_mismatch(TypeTag::Paths, &other)),
        }
    }

    pub fn into_stub(self) -> Result<StubRef, FsError> {
        match self {
            Value::Stub(reference) => Ok(reference),
            other => Err(reply_mismatch(TypeTag::Stub, &other)),
        }
    }
}

fn reply_mismatch(expected: TypeTag, got: &Value) -> FsError {
    crate::error::RpcError::Transport(format!(
        "expected a {expected:?} value, got {:?}",
        got.type_tag()
    ))
    .into()
}

/// The client-to-server frame of one call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub method: String,
    pub param_types: Vec<TypeTag>,
    pub args: Vec<Value>,
}

/// The server-to-client frame of one call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CallReply {
    /// The method returned; the payload is its return value.
    Ok(Value),
    /// Something failed on the server side; the fault says what.
    RemoteError(Fault),
}

/// The marshalled error value of a failed call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Fault {
    /// The call never reached the target method: framing, decoding, or
    /// invocation plumbing failed.
    Transport(String),
    /// Method resolution failed on the server's interface descriptor.
    NoSuchMethod(String),
    /// The target method raised its declared error; the stub re-raises it.
    MethodThrew(FsError),
}

/// Serializes a frame with its 4-byte little-endian length prefix.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, bincode::Error> {
    let payload = bincode::serialize(msg)?;
    let len = payload.len() as u32;

    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Deserializes a frame payload (without the length prefix).
pub fn decode_frame<T: DeserializeOwned>(payload: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(payload)
}
