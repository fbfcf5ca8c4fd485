//! Remote interface descriptors
//!
//! A descriptor is the runtime value of an interface: its name and the set
//! of operations it declares. Method resolution on the server side is a
//! lookup by `(name, parameter types)`; validation enforces the rule that
//! every operation of a remote interface declares the transport-level
//! error.

use std::hash::{Hash, Hasher};

use atlasfs_core::wire::TypeTag;
use atlasfs_core::RpcError;

/// A single operation of a remote interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDef {
    pub name: &'static str,
    pub params: Vec<TypeTag>,
    pub returns: TypeTag,
    /// Whether the operation declares that it may fail with a transport
    /// error. Every operation of a valid remote interface must.
    pub throws_transport: bool,
}

/// A declared set of named operations.
///
/// Descriptor identity is the interface name: two descriptors with the same
/// name compare equal, and stub equality builds on this.
#[derive(Clone, Debug)]
pub struct InterfaceDescriptor {
    name: &'static str,
    methods: Vec<MethodDef>,
}

impl InterfaceDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            methods: Vec::new(),
        }
    }

    /// Declares an operation that may fail with a transport error.
    pub fn method(
        mut self,
        name: &'static str,
        params: &[TypeTag],
        returns: TypeTag,
    ) -> Self {
        self.methods.push(MethodDef {
            name,
            params: params.to_vec(),
            returns,
            throws_transport: true,
        });
        self
    }

    /// Declares an operation without the transport-error marker.
    ///
    /// A descriptor containing one does not validate as a remote interface;
    /// skeletons and stubs will refuse it.
    pub fn method_without_transport(
        mut self,
        name: &'static str,
        params: &[TypeTag],
        returns: TypeTag,
    ) -> Self {
        self.methods.push(MethodDef {
            name,
            params: params.to_vec(),
            returns,
            throws_transport: false,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Checks that this descriptor is a valid remote interface.
    pub fn validate(&self) -> Result<(), RpcError> {
        for method in &self.methods {
            if !method.throws_transport {
                return Err(RpcError::BadInterface(format!(
                    "{}::{} does not declare the transport error",
                    self.name, method.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves an operation by name and parameter types.
    pub fn resolve(&self, name: &str, params: &[TypeTag]) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params == params)
    }

    /// Looks an operation up by name alone (the stub side, where the
    /// declared parameter types are taken from the descriptor).
    pub fn get(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl PartialEq for InterfaceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for InterfaceDescriptor {}

impl Hash for InterfaceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
