//! Argument extraction for the dispatchers.
//!
//! The skeleton resolves `(name, parameter types)` on the descriptor
//! before invoking, so these mismatches only occur when the two ends
//! disagree about a method's shape; they surface as plumbing failures,
//! which the transport reports as transport errors.

use atlasfs_core::wire::{StubRef, TypeTag, Value};
use atlasfs_core::Path;
use atlasfs_rpc::InvokeError;

pub(crate) struct ArgReader<'a> {
    method: &'a str,
    values: std::vec::IntoIter<Value>,
    index: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(method: &'a str, args: Vec<Value>) -> Self {
        Self {
            method,
            values: args.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self, expected: TypeTag) -> Result<Value, InvokeError> {
        self.index += 1;
        match self.values.next() {
            Some(value) if value.type_tag() == expected => Ok(value),
            Some(value) => Err(InvokeError::Plumbing(format!(
                "{}: argument {} should be a {expected:?}, got {:?}",
                self.method,
                self.index,
                value.type_tag()
            ))),
            None => Err(InvokeError::Plumbing(format!(
                "{}: argument {} ({expected:?}) is missing",
                self.method, self.index
            ))),
        }
    }

    pub fn path(&mut self) -> Result<Path, InvokeError> {
        match self.next(TypeTag::Path)? {
            Value::Path(path) => Ok(path),
            _ => unreachable!("tag checked above"),
        }
    }

    pub fn paths(&mut self) -> Result<Vec<Path>, InvokeError> {
        match self.next(TypeTag::Paths)? {
            Value::Paths(paths) => Ok(paths),
            _ => unreachable!("tag checked above"),
        }
    }

    pub fn u64(&mut self) -> Result<u64, InvokeError> {
        match self.next(TypeTag::U64)? {
            Value::U64(n) => Ok(n),
            _ => unreachable!("tag checked above"),
        }
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, InvokeError> {
        match self.next(TypeTag::Bytes)? {
            Value::Bytes(data) => Ok(data),
            _ => unreachable!("tag checked above"),
        }
    }

    pub fn stub(&mut self) -> Result<StubRef, InvokeError> {
        match self.next(TypeTag::Stub)? {
            Value::Stub(reference) => Ok(reference),
            _ => unreachable!("tag checked above"),
        }
    }
}
