//! # Class Registry and Proxy Factory
//!
//! The engine reports the class of every object it returns. The registry maps
//! those class names to allocators supplied by the embedding layer, and the
//! factory turns a returned reference into a proxy of the right local type.
//!
//! ## Materialization
//!
//! 1. Resolve the class name. Unknown names fail with `Lookup`.
//! 2. Allocate the proxy. Allocators do not run the type's normal constructor.
//! 3. Attach the handle under `HANDLE_ATTR`. A refusal fails with `Decoding`.
//! 4. Register the pairing with the engine so it can call back into the
//!    proxy. This step is best effort: a failure is logged and the proxy is
//!    still returned.
//!
//! No deduplication happens. The same address may yield distinct proxies;
//! compare them by `handle()`.

use std::sync::Arc;

use dashmap::DashMap;
use enginerpc::Request;
use tracing::debug;
use tracing::warn;

use crate::codec::ClassName;
use crate::codec::HostValue;
use crate::error::BridgeError;
use crate::error::Result;
use crate::handle::OwnerToken;
use crate::handle::RemoteHandle;
use crate::peer::Peer;

/// Attribute under which a proxy stores its engine handle.
pub const HANDLE_ATTR: &str = "unreal_object";

/// A host attribute could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeError {
    pub attribute: String,
    pub reason: String,
}

impl std::fmt::Display for AttributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot set attribute '{}': {}", self.attribute, self.reason)
    }
}

impl std::error::Error for AttributeError {}

/// A host-side object that can stand in for an engine object.
pub trait HostObject: Send + Sync + std::fmt::Debug {
    fn token(&self) -> OwnerToken;

    fn class_name(&self) -> &ClassName;

    fn set_attribute(&self, name: &str, value: HostValue) -> std::result::Result<(), AttributeError>;

    /// The engine handle attached under `HANDLE_ATTR`, if any.
    fn handle(&self) -> Option<RemoteHandle>;
}

/// The default proxy: a bag of attributes with a fresh owner token.
#[derive(Debug)]
pub struct ProxyObject {
    token: OwnerToken,
    class: ClassName,
    attributes: DashMap<String, HostValue>,
}

impl ProxyObject {
    pub fn new(class: ClassName) -> Self {
        Self { token: OwnerToken::mint(), class, attributes: DashMap::new() }
    }

    pub fn attribute(&self, name: &str) -> Option<HostValue> {
        self.attributes.get(name).map(|v| v.value().clone())
    }
}

impl HostObject for ProxyObject {
    fn token(&self) -> OwnerToken {
        self.token
    }

    fn class_name(&self) -> &ClassName {
        &self.class
    }

    fn set_attribute(&self, name: &str, value: HostValue) -> std::result::Result<(), AttributeError> {
        if name.is_empty() {
            return Err(AttributeError { attribute: name.into(), reason: "empty attribute name".into() });
        }
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    fn handle(&self) -> Option<RemoteHandle> {
        self.attributes.get(HANDLE_ATTR).and_then(|v| v.value().as_handle().cloned())
    }
}

/// Allocates an uninitialized proxy for a class.
pub type Allocator = Arc<dyn Fn(&ClassName) -> Arc<dyn HostObject> + Send + Sync>;

/// Class name to allocator. Populated once by the embedding layer.
#[derive(Default)]
pub struct ClassRegistry {
    classes: DashMap<ClassName, Allocator>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `allocator` for `name`, replacing any earlier registration.
    pub fn register<F>(&self, name: &str, allocator: F) -> Result<()>
    where
        F: Fn(&ClassName) -> Arc<dyn HostObject> + Send + Sync + 'static,
    {
        let class = ClassName::new(name)?;
        self.classes.insert(class, Arc::new(allocator));
        Ok(())
    }

    /// Registers `name` with the default `ProxyObject` allocator.
    pub fn register_proxy(&self, name: &str) -> Result<()> {
        self.register(name, |class| Arc::new(ProxyObject::new(class.clone())) as Arc<dyn HostObject>)
    }

    pub fn resolve(&self, name: &str) -> Result<Allocator> {
        ClassName::new(name)
            .ok()
            .and_then(|class| self.classes.get(&class).map(|entry| entry.value().clone()))
            .ok_or_else(|| BridgeError::Lookup(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.classes.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        f.debug_struct("ClassRegistry").field("classes", &names).finish()
    }
}

/// Builds proxies for references returned by the engine.
#[derive(Debug, Clone)]
pub struct ProxyFactory {
    registry: Arc<ClassRegistry>,
}

impl ProxyFactory {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Creates a proxy of `class` bound to the engine object at `address`.
    pub async fn materialize(
        &self,
        peer: &Peer,
        class: &str,
        address: u64,
        display_name: &str,
    ) -> Result<Arc<dyn HostObject>> {
        let allocator = self.registry.resolve(class)?;
        let class = ClassName::new(class)?;
        let proxy = allocator(&class);

        let handle = RemoteHandle::new(address, display_name);
        proxy
            .set_attribute(HANDLE_ATTR, HostValue::Handle(handle.clone()))
            .map_err(|e| BridgeError::Decoding(e.to_string()))?;

        let request = Request::RegisterCreatedPyObject {
            py_object: proxy.token().to_object_ref(""),
            unreal_object: handle.to_object_ref(),
            ue_class: class.to_string(),
        };
        match peer.call(&request).await {
            Ok(_) => debug!(%handle, %class, token = %proxy.token(), "registered proxy with engine"),
            Err(e) => warn!(%handle, %class, error = %e, "proxy registration failed"),
        }

        Ok(proxy)
    }
}
