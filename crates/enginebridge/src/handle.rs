//! Identities on both sides of the bridge.
//!
//! A `RemoteHandle` names an object inside the engine. An `OwnerToken` names a
//! host-side object so the engine can refer back to it.

use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use enginerpc::ObjectRef;

/// A reference to an object living in the engine.
///
/// Identity is the address alone. The display name is a label for humans and
/// never takes part in equality or hashing. The engine decides when the object
/// dies; dropping a handle does nothing remotely.
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    address: u64,
    display_name: String,
}

impl RemoteHandle {
    pub fn new(address: u64, display_name: impl Into<String>) -> Self {
        Self { address, display_name: display_name.into() }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn to_object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.address, self.display_name.clone())
    }
}

impl From<ObjectRef> for RemoteHandle {
    fn from(obj: ObjectRef) -> Self {
        Self { address: obj.address, display_name: obj.name }
    }
}

impl PartialEq for RemoteHandle {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for RemoteHandle {}

impl Hash for RemoteHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl std::fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RemoteHandle(name={}, address=0x{:016x})", self.display_name, self.address)
    }
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// The identity of a host-side object, as sent to the engine.
///
/// Tokens are process-unique and never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerToken(u64);

impl OwnerToken {
    /// Mints a token no other host object holds.
    pub fn mint() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps an identity assigned elsewhere, e.g. by an embedding layer.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_object_ref(&self, name: impl Into<String>) -> ObjectRef {
        ObjectRef::new(self.0, name)
    }
}

impl std::fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OwnerToken(0x{:016x})", self.0)
    }
}

/// Anything that can stand for an object in a request.
pub trait AsObjectRef {
    fn as_object_ref(&self) -> ObjectRef;
}

impl AsObjectRef for RemoteHandle {
    fn as_object_ref(&self) -> ObjectRef {
        self.to_object_ref()
    }
}

impl AsObjectRef for OwnerToken {
    fn as_object_ref(&self) -> ObjectRef {
        self.to_object_ref("")
    }
}
