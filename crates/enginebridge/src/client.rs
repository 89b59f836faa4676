//! # Bridge Operations
//!
//! The six public operations against engine objects. Each follows the same
//! path:
//!
//! ```text
//! encode args -> ensure connected -> call peer -> decode results
//! ```
//!
//! Encoding happens before the connection is touched, so a bad argument never
//! causes network I/O. A transport failure is not retried within the
//! operation; the next operation reconnects.

use std::sync::Arc;

use enginerpc::FailureKind;
use enginerpc::Request;
use enginerpc::Response;
use enginerpc::WireValue;
use tracing::debug;

use crate::codec;
use crate::codec::Argument;
use crate::codec::ClassName;
use crate::codec::Decoded;
use crate::codec::HostValue;
use crate::codec::ValueRole;
use crate::config::BridgeConfig;
use crate::connection::ConnectionManager;
use crate::connection::Connector;
use crate::error::BridgeError;
use crate::error::ConnectionErrorKind;
use crate::error::Result;
use crate::handle::AsObjectRef;
use crate::handle::OwnerToken;
use crate::handle::RemoteHandle;
use crate::peer;
use crate::peer::Peer;
use crate::registry::ClassRegistry;
use crate::registry::ProxyFactory;

/// Values produced by a function call: the return value first, then the
/// out-parameters in declaration order. Empty when the function returns void.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    pub values: Vec<HostValue>,
}

impl CallResult {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// The return value, if the function returned one.
    pub fn return_value(&self) -> Option<&HostValue> {
        self.values.first()
    }

    pub fn out_params(&self) -> &[HostValue] {
        self.values.get(1..).unwrap_or(&[])
    }
}

/// Async client for one engine.
pub struct BridgeClient {
    connections: ConnectionManager,
    factory: ProxyFactory,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig, registry: Arc<ClassRegistry>) -> Result<Self> {
        Ok(Self {
            connections: ConnectionManager::new(config)?,
            factory: ProxyFactory::new(registry),
        })
    }

    pub fn with_connector(
        config: BridgeConfig,
        registry: Arc<ClassRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        Ok(Self {
            connections: ConnectionManager::with_connector(config, connector)?,
            factory: ProxyFactory::new(registry),
        })
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        self.factory.registry()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Connects eagerly and returns the engine port.
    pub async fn connect(&self) -> Result<u16> {
        self.connections.ensure_connected().await?;
        self.connections
            .port()
            .await
            .ok_or_else(|| BridgeError::connection(ConnectionErrorKind::Disconnected, "connection lost right after connect"))
    }

    pub async fn port(&self) -> Option<u16> {
        self.connections.port().await
    }

    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
    }

    /// Creates an engine object of `class` owned by the host object `owner`.
    pub async fn construct(
        &self,
        class: &ClassName,
        flags: u32,
        display_name: &str,
        args: &[Argument],
        owner: OwnerToken,
    ) -> Result<RemoteHandle> {
        let construct_args = codec::encode_batch(args)?;
        let request = Request::NewObject {
            ue_class: class.to_string(),
            flags,
            obj_name: display_name.to_string(),
            own: owner.to_object_ref(display_name),
            construct_args,
        };

        let peer = self.connections.ensure_connected().await?;
        match peer.call(&request).await {
            Ok(Response::NewObject { object }) => {
                let handle = RemoteHandle::from(object);
                debug!(%class, %handle, "constructed engine object");
                Ok(handle)
            }
            Ok(other) => Err(unexpected(&request, &other)),
            Err(peer::Error::Remote(failure)) if failure.kind != FailureKind::Disconnected => {
                Err(BridgeError::ConstructionFailed(failure))
            }
            Err(e) => Err(self.fail(&peer, e).await),
        }
    }

    /// Destroys an engine object. Returns `false` if it was already gone.
    pub async fn destroy<T: AsObjectRef + ?Sized>(&self, target: &T) -> Result<bool> {
        let request = Request::DestroyObject { own: target.as_object_ref() };
        match self.request(&request).await? {
            Response::DestroyObject { result } => Ok(result),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Calls `method` on the engine object `this`.
    pub async fn call_method(
        &self,
        owner: OwnerToken,
        class: &ClassName,
        this: &RemoteHandle,
        method: &str,
        args: &[Argument],
    ) -> Result<CallResult> {
        let params = codec::encode_batch(args)?;
        let request = Request::CallFunction {
            own: owner.to_object_ref(""),
            ue_class: class.to_string(),
            call_object: this.to_object_ref(),
            func_name: method.to_string(),
            params,
        };

        let (peer, response) = self.request_on_peer(&request).await?;
        match response {
            Response::CallFunction { ret, out_params } => self.call_result(&peer, ret, out_params).await,
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Calls a static function of `class`.
    pub async fn call_static(&self, class: &ClassName, method: &str, args: &[Argument]) -> Result<CallResult> {
        let params = codec::encode_batch(args)?;
        let request = Request::CallStaticFunction {
            ue_class: class.to_string(),
            func_name: method.to_string(),
            params,
        };

        let (peer, response) = self.request_on_peer(&request).await?;
        match response {
            Response::CallStaticFunction { ret, out_params } => self.call_result(&peer, ret, out_params).await,
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Reads a property. References come back as raw handles.
    pub async fn get_property(&self, owner: OwnerToken, class: &ClassName, name: &str) -> Result<HostValue> {
        let request = Request::GetProperty {
            ue_class: class.to_string(),
            owner: owner.to_object_ref(""),
            property_name: name.to_string(),
        };

        match self.request(&request).await? {
            Response::GetProperty { property } => match codec::decode(property, ValueRole::OutParam)? {
                Decoded::Ready(value) => Ok(value),
                Decoded::Reference { handle, .. } => Ok(HostValue::Handle(handle)),
            },
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn set_property(&self, owner: OwnerToken, class: &ClassName, value: &Argument) -> Result<()> {
        let mut encoded = codec::encode_batch(std::slice::from_ref(value))?;
        let property = encoded
            .pop()
            .ok_or_else(|| BridgeError::Encoding("property value vanished during encoding".into()))?;
        let request = Request::SetProperty {
            ue_class: class.to_string(),
            owner: owner.to_object_ref(""),
            property,
        };

        match self.request(&request).await? {
            Response::SetProperty => Ok(()),
            other => Err(unexpected(&request, &other)),
        }
    }

    async fn request(&self, request: &Request) -> Result<Response> {
        self.request_on_peer(request).await.map(|(_, response)| response)
    }

    async fn request_on_peer(&self, request: &Request) -> Result<(Arc<Peer>, Response)> {
        let peer = self.connections.ensure_connected().await?;
        match peer.call(request).await {
            Ok(response) => Ok((peer, response)),
            Err(e) => Err(self.fail(&peer, e).await),
        }
    }

    /// Maps a peer error, dropping the connection when the engine is gone.
    async fn fail(&self, peer: &Arc<Peer>, e: peer::Error) -> BridgeError {
        let error = BridgeError::from(e);
        if let BridgeError::Connection { kind, detail } = &error {
            debug!(peer = peer.peer_name(), %kind, %detail, "operation lost its connection");
            self.connections.discard(peer).await;
        }
        error
    }

    async fn call_result(&self, peer: &Peer, ret: WireValue, out_params: Vec<WireValue>) -> Result<CallResult> {
        let Some(ret) = self.resolve(peer, ret, ValueRole::Return).await? else {
            return Ok(CallResult::default());
        };

        let mut values = Vec::with_capacity(out_params.len() + 1);
        values.push(ret);
        for param in out_params {
            let value = self.resolve(peer, param, ValueRole::OutParam).await?.unwrap_or(HostValue::None);
            values.push(value);
        }
        Ok(CallResult { values })
    }

    /// Decodes one value, building a proxy for returned references.
    ///
    /// Returns `None` for a void value.
    async fn resolve(&self, peer: &Peer, value: WireValue, role: ValueRole) -> Result<Option<HostValue>> {
        match codec::decode(value, role)? {
            Decoded::Ready(HostValue::None) => Ok(None),
            Decoded::Ready(value) => Ok(Some(value)),
            Decoded::Reference { class, handle } => {
                let proxy = self
                    .factory
                    .materialize(peer, class.as_str(), handle.address(), handle.display_name())
                    .await?;
                Ok(Some(HostValue::Proxy(proxy)))
            }
        }
    }
}

fn unexpected(request: &Request, response: &Response) -> BridgeError {
    BridgeError::Decoding(format!(
        "engine answered {} with a {} response",
        request.method(),
        response.method()
    ))
}
