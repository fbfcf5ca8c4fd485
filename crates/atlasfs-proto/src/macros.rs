//! Shared plumbing for the typed stubs.

/// Declares a typed stub struct wrapping [`atlasfs_rpc::Stub`] for one
/// interface: constructors, wire identity, serde as a [`StubRef`], and the
/// stub's local display form.
///
/// [`StubRef`]: atlasfs_core::wire::StubRef
macro_rules! declare_stub {
    ($(#[$meta:meta])* $name:ident, $descriptor:path) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            stub: atlasfs_rpc::Stub,
        }

        impl $name {
            /// Creates a stub for a server at `endpoint` (`host:port`).
            pub fn new(
                endpoint: impl Into<String>,
            ) -> Result<Self, atlasfs_core::RpcError> {
                Ok(Self {
                    stub: atlasfs_rpc::Stub::new($descriptor(), endpoint)?,
                })
            }

            /// Creates a stub addressing `skeleton`'s bound endpoint.
            pub fn for_skeleton(
                skeleton: &atlasfs_rpc::Skeleton,
            ) -> Result<Self, atlasfs_core::RpcError> {
                Ok(Self {
                    stub: atlasfs_rpc::Stub::for_skeleton($descriptor(), skeleton)?,
                })
            }

            /// Creates a stub for `skeleton`'s port on an externally
            /// supplied host.
            pub fn with_hostname(
                skeleton: &atlasfs_rpc::Skeleton,
                hostname: &str,
            ) -> Result<Self, atlasfs_core::RpcError> {
                Ok(Self {
                    stub: atlasfs_rpc::Stub::with_hostname($descriptor(), skeleton, hostname)?,
                })
            }

            /// Rebuilds a stub from its wire identity.
            pub fn from_ref(
                reference: atlasfs_core::wire::StubRef,
            ) -> Result<Self, atlasfs_core::RpcError> {
                Ok(Self {
                    stub: atlasfs_rpc::Stub::from_ref($descriptor(), reference)?,
                })
            }

            /// This stub's wire identity.
            pub fn to_ref(&self) -> atlasfs_core::wire::StubRef {
                self.stub.to_ref()
            }

            pub fn endpoint(&self) -> &str {
                self.stub.endpoint()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.stub, f)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                self.to_ref().serialize(serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let reference = atlasfs_core::wire::StubRef::deserialize(deserializer)?;
                Self::from_ref(reference).map_err(serde::de::Error::custom)
            }
        }
    };
}
