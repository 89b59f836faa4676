//! Blocking facade over `BridgeClient` for callers without an async runtime.
//!
//! Every call blocks the calling thread until the engine replies. Do not call
//! these methods from inside another tokio runtime. Dropping a `Bridge` there
//! is allowed: the connection is released without blocking.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::warn;

use crate::client::BridgeClient;
use crate::client::CallResult;
use crate::codec::Argument;
use crate::codec::ClassName;
use crate::codec::HostValue;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::error::Result;
use crate::handle::AsObjectRef;
use crate::handle::OwnerToken;
use crate::handle::RemoteHandle;
use crate::registry::ClassRegistry;

pub struct Bridge {
    /// Only `None` while dropping.
    runtime: Option<Runtime>,
    client: BridgeClient,
}

impl Bridge {
    pub fn new(config: BridgeConfig, registry: Arc<ClassRegistry>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("engine-bridge")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Config(format!("cannot start bridge runtime: {}", e)))?;
        let client = BridgeClient::new(config, registry)?;
        Ok(Self { runtime: Some(runtime), client })
    }

    /// Runs `future` to completion on the bridge runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        let Some(runtime) = &self.runtime else {
            unreachable!("bridge runtime used after drop");
        };
        runtime.block_on(future)
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub fn connect(&self) -> Result<u16> {
        self.block_on(self.client.connect())
    }

    pub fn port(&self) -> Option<u16> {
        self.block_on(self.client.port())
    }

    pub fn shutdown(&self) {
        self.block_on(self.client.shutdown())
    }

    pub fn construct(
        &self,
        class: &ClassName,
        flags: u32,
        display_name: &str,
        args: &[Argument],
        owner: OwnerToken,
    ) -> Result<RemoteHandle> {
        self.block_on(self.client.construct(class, flags, display_name, args, owner))
    }

    pub fn destroy<T: AsObjectRef + ?Sized>(&self, target: &T) -> Result<bool> {
        self.block_on(self.client.destroy(target))
    }

    pub fn call_method(
        &self,
        owner: OwnerToken,
        class: &ClassName,
        this: &RemoteHandle,
        method: &str,
        args: &[Argument],
    ) -> Result<CallResult> {
        self.block_on(self.client.call_method(owner, class, this, method, args))
    }

    pub fn call_static(&self, class: &ClassName, method: &str, args: &[Argument]) -> Result<CallResult> {
        self.block_on(self.client.call_static(class, method, args))
    }

    pub fn get_property(&self, owner: OwnerToken, class: &ClassName, name: &str) -> Result<HostValue> {
        self.block_on(self.client.get_property(owner, class, name))
    }

    pub fn set_property(&self, owner: OwnerToken, class: &ClassName, value: &Argument) -> Result<()> {
        self.block_on(self.client.set_property(owner, class, value))
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            if !self.client.connections().release() {
                warn!("engine connection busy while dropping bridge, leaving it to the runtime");
            }
            runtime.shutdown_background();
        } else {
            runtime.block_on(self.client.shutdown());
        }
    }
}
