//! # EngineRPC
//!
//! A strict, request/response protocol over enginepack for driving objects that
//! live inside a separate engine process.
//!
//! ## Architecture
//!
//! - `value`: the tagged `WireValue` union every argument and result travels as.
//! - `message`: parameters and results of the seven engine procedures.
//! - `frame`: the Call/Reply envelope with sequence numbers for correlation.
//! - `error`: local protocol errors vs failures reported by the engine.

mod error;
mod frame;
mod message;
mod value;

#[cfg(test)]
mod tests;

pub use error::Error;
pub use error::FailureKind;
pub use error::RemoteFailure;
pub use error::Result;
pub use frame::CallDecoder;
pub use frame::CallEncoder;
pub use frame::ReplyDecoder;
pub use frame::ReplyEncoder;
pub use frame::RpcFrame;
pub use frame::decode_seq;
pub use message::Method;
pub use message::Request;
pub use message::Response;
pub use value::ObjectRef;
pub use value::Payload;
pub use value::WireValue;
pub use value::decode_values;
pub use value::encode_values;
