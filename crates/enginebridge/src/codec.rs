//! # Argument Codec
//!
//! Converts between host values and wire values.
//!
//! ## Outgoing
//!
//! Callers hand over `Argument`s that already carry a declared class and a
//! classified `HostValue`. `encode_batch` is all-or-nothing: if any argument
//! cannot be represented, the batch is rejected before any I/O happens.
//!
//! ## Incoming
//!
//! `decode` maps a wire value to a host value according to its role:
//!
//! | wire value              | `Return`                   | `OutParam`              |
//! |-------------------------|----------------------------|-------------------------|
//! | class `"void"`          | `HostValue::None`          | `HostValue::None`       |
//! | primitive               | matching primitive         | matching primitive      |
//! | reference               | `Decoded::Reference`       | `HostValue::Handle`     |
//!
//! A `Decoded::Reference` still needs a proxy; the proxy factory builds it.

use std::sync::Arc;

use enginerpc::ObjectRef;
use enginerpc::Payload;
use enginerpc::WireValue;

use crate::error::BridgeError;
use crate::error::Result;
use crate::handle::OwnerToken;
use crate::handle::RemoteHandle;
use crate::registry::HostObject;

/// Declared class of a value that carries nothing.
pub const VOID_CLASS: &str = "void";

/// Classification hint: treat an integer as an enum ordinal.
pub const HINT_ENUM: &str = "enum";

/// Classification hint: truncate a float to an integer.
pub const HINT_INT: &str = "int";

/// An engine type name. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BridgeError::Encoding("class name must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_void(&self) -> bool {
        self.0 == VOID_CLASS
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value on the host side of the bridge.
#[derive(Debug, Clone)]
pub enum HostValue {
    None,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    /// An enum ordinal.
    Enum(i64),
    /// A raw engine reference with no proxy around it.
    Handle(RemoteHandle),
    /// A host object identified by its owner token.
    Object(OwnerToken),
    /// A proxy produced by the proxy factory.
    Proxy(Arc<dyn HostObject>),
    /// A value the caller could not classify. Never encodable.
    Unclassified(String),
}

impl HostValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_handle(&self) -> Option<&RemoteHandle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// A short name for the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Enum(_) => "enum",
            Self::Handle(_) => "handle",
            Self::Object(_) => "object",
            Self::Proxy(_) => "proxy",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Proxy(a), Self::Proxy(b)) => a.token() == b.token(),
            (Self::Unclassified(a), Self::Unclassified(b)) => a == b,
            _ => false,
        }
    }
}

/// A host value before classification, as the embedding layer sees it.
#[derive(Debug, Clone)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A member of a host enum, by ordinal.
    EnumMember(i64),
    Object(OwnerToken),
    Proxy(Arc<dyn HostObject>),
    /// Anything else, described by its type name.
    Other(String),
}

/// A named, classed value to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub class: ClassName,
    pub value: HostValue,
}

impl Argument {
    pub fn new(name: impl Into<String>, class: ClassName, value: HostValue) -> Self {
        Self { name: name.into(), class, value }
    }

    /// Classifies `raw` using the declared class and an optional hint.
    ///
    /// Integers become enum ordinals under `HINT_ENUM`; floats are truncated
    /// under `HINT_INT`. Values with no wire shape stay `Unclassified` and make
    /// the whole batch fail at encode time.
    pub fn classify(name: impl Into<String>, class: ClassName, raw: RawValue, hint: Option<&str>) -> Self {
        let value = match raw {
            RawValue::Bool(b) => HostValue::Bool(b),
            RawValue::Int(i) if hint == Some(HINT_ENUM) => HostValue::Enum(i),
            RawValue::Int(i) => HostValue::Int(i),
            RawValue::Float(f) if hint == Some(HINT_INT) => HostValue::Int(f as i64),
            RawValue::Float(f) => HostValue::Float(f),
            RawValue::Str(s) => HostValue::Str(s),
            RawValue::EnumMember(ordinal) => HostValue::Enum(ordinal),
            RawValue::Object(token) => HostValue::Object(token),
            RawValue::Proxy(proxy) => HostValue::Proxy(proxy),
            RawValue::Other(type_name) => HostValue::Unclassified(type_name),
        };
        Self::new(name, class, value)
    }

    fn to_wire(&self, index: usize) -> Result<WireValue> {
        let payload = match &self.value {
            HostValue::Bool(b) => Payload::Bool(*b),
            HostValue::Uint(u) => Payload::Uint(*u),
            HostValue::Int(i) => Payload::Int(*i),
            HostValue::Float(f) => Payload::Float(*f),
            HostValue::Str(s) => Payload::Str(s.clone()),
            HostValue::Enum(ordinal) => Payload::Enum(*ordinal),
            HostValue::Handle(handle) => Payload::Object(handle.to_object_ref()),
            HostValue::Object(token) => Payload::Object(token.to_object_ref(self.name.clone())),
            HostValue::Proxy(proxy) => {
                let label = proxy.handle().map(|h| h.display_name().to_string()).unwrap_or_default();
                Payload::Object(ObjectRef::new(proxy.token().value(), label))
            }
            HostValue::None | HostValue::Unclassified(_) => {
                return Err(BridgeError::Encoding(format!(
                    "argument {} ('{}', class {}) has no wire representation: {}",
                    index,
                    self.name,
                    self.class,
                    describe(&self.value)
                )));
            }
        };
        Ok(WireValue::new(self.name.clone(), self.class.as_str(), payload))
    }
}

fn describe(value: &HostValue) -> String {
    match value {
        HostValue::Unclassified(type_name) => format!("unclassified {}", type_name),
        other => other.kind().to_string(),
    }
}

/// Encodes every argument, or none.
pub fn encode_batch(args: &[Argument]) -> Result<Vec<WireValue>> {
    args.iter().enumerate().map(|(i, arg)| arg.to_wire(i)).collect()
}

/// How a decoded value reached the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRole {
    /// A function's return value. References become proxies.
    Return,
    /// An out-parameter or property read. References stay raw handles.
    OutParam,
}

/// The result of decoding one wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Ready(HostValue),
    /// A returned reference that still needs a proxy.
    Reference { class: ClassName, handle: RemoteHandle },
}

pub fn decode(value: WireValue, role: ValueRole) -> Result<Decoded> {
    let class = ClassName::new(value.class)
        .map_err(|_| BridgeError::Decoding(format!("value '{}' has no class", value.name)))?;
    if class.is_void() {
        return Ok(Decoded::Ready(HostValue::None));
    }

    let host = match value.payload {
        Payload::Bool(b) => HostValue::Bool(b),
        Payload::Uint(u) => HostValue::Uint(u),
        Payload::Int(i) => HostValue::Int(i),
        Payload::Float(f) => HostValue::Float(f),
        Payload::Str(s) => HostValue::Str(s),
        Payload::Enum(ordinal) => HostValue::Enum(ordinal),
        Payload::Object(obj) => match role {
            ValueRole::Return => return Ok(Decoded::Reference { class, handle: obj.into() }),
            ValueRole::OutParam => HostValue::Handle(obj.into()),
        },
    };
    Ok(Decoded::Ready(host))
}
