//! # Engine Bridge
//!
//! Drives objects that live inside a separately running engine process.
//!
//! ## Architecture
//!
//! - `connection`: port discovery, the live `Peer`, reconnect on demand.
//! - `peer`: pipelined request/reply correlation over a `Transport`.
//! - `codec`: host values to wire values and back.
//! - `registry`: class names to proxy allocators, and the proxy factory.
//! - `client`: the bridge operations (`BridgeClient`), with a blocking facade
//!   in `blocking`.
//!
//! ## Identity
//!
//! Engine objects are known by address. A `RemoteHandle` compares by address
//! only, and the engine decides when an object dies.

pub mod blocking;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handle;
pub mod logging;
#[cfg(any(test, feature = "test-util"))]
pub mod mock_transport;
pub mod peer;
pub mod registry;
pub mod tcp;
pub mod transport;


pub use blocking::Bridge;
pub use client::BridgeClient;
pub use client::CallResult;
pub use codec::Argument;
pub use codec::ClassName;
pub use codec::HostValue;
pub use codec::RawValue;
pub use codec::ValueRole;
pub use config::BridgeConfig;
pub use connection::ConnectionManager;
pub use connection::Connector;
pub use error::BridgeError;
pub use error::ConnectionErrorKind;
pub use error::Result;
pub use handle::OwnerToken;
pub use handle::RemoteHandle;
pub use registry::ClassRegistry;
pub use registry::HostObject;
pub use registry::ProxyFactory;
pub use registry::ProxyObject;
pub use registry::HANDLE_ATTR;
