//! # Wire Values
//!
//! The tagged union that carries every argument, return value, out-parameter
//! and property across the process boundary.
//!
//! ## Wire Format
//!
//! ```text
//! Map {
//!     name:    str,
//!     ueClass: str,
//!     value:   Variant(kind, payload),
//! }
//! ```
//!
//! `kind` is one of `boolValue`, `uintValue`, `intValue`, `floatValue`,
//! `strValue`, `enumValue`, `object`. An object payload is
//! `Map { address: u64, name: str }`.
//!
//! ## Invariants
//! - Exactly one payload per value; the enum makes reading the wrong arm impossible.
//! - `class` is never empty on the wire. Decoding an empty class is a protocol violation.

use enginepack::Decoder;
use enginepack::Encoder;

use crate::error::Error;
use crate::error::Result;

/// Identifies an object by address, with a display label.
///
/// The address is either an engine object address or a host owner token,
/// depending on which side minted it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectRef {
    pub address: u64,
    pub name: String,
}

impl ObjectRef {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self { address, name: name.into() }
    }

    /// An address-only reference, as sent for owner tokens.
    pub fn address_only(address: u64) -> Self {
        Self { address, name: String::new() }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.map_begin()?;
        enc.field_u64("address", self.address)?;
        enc.field_str("name", &self.name)?;
        enc.map_end()?;
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self> {
        let mut map = dec.map()?;
        let mut address = None;
        let mut name = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "address" => address = Some(val.u64()?),
                "name" => name = Some(val.str()?.to_string()),
                _ => val.skip()?,
            }
        }

        Ok(Self {
            address: address.ok_or(Error::MissingField("address"))?,
            name: name.unwrap_or_default(),
        })
    }
}

/// The active arm of a wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(i64),
    Object(ObjectRef),
}

impl Payload {
    /// The wire tag for this arm.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolValue",
            Self::Uint(_) => "uintValue",
            Self::Int(_) => "intValue",
            Self::Float(_) => "floatValue",
            Self::Str(_) => "strValue",
            Self::Enum(_) => "enumValue",
            Self::Object(_) => "object",
        }
    }

    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin(self.kind())?;
        match self {
            Self::Bool(v) => enc.bool(*v)?,
            Self::Uint(v) => enc.u64(*v)?,
            Self::Int(v) => enc.s64(*v)?,
            Self::Float(v) => enc.f64(*v)?,
            Self::Str(v) => enc.str(v)?,
            Self::Enum(v) => enc.s64(*v)?,
            Self::Object(obj) => obj.encode(enc)?,
        }
        enc.variant_end()?;
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self> {
        let (kind, mut body) = dec.variant()?;
        let payload = match kind {
            "boolValue" => Self::Bool(body.bool()?),
            "uintValue" => Self::Uint(body.u64()?),
            "intValue" => Self::Int(body.s64()?),
            "floatValue" => Self::Float(body.f64()?),
            "strValue" => Self::Str(body.str()?.to_string()),
            "enumValue" => Self::Enum(body.s64()?),
            "object" => Self::Object(ObjectRef::decode(&mut body)?),
            other => return Err(Error::UnknownVariant(format!("argument kind: {}", other))),
        };
        Ok(payload)
    }
}

/// A named, classed value crossing the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct WireValue {
    /// Parameter name on send; display name on a returned reference.
    pub name: String,
    /// The engine type name used for dispatch on the receiving side.
    pub class: String,
    pub payload: Payload,
}

impl WireValue {
    pub fn new(name: impl Into<String>, class: impl Into<String>, payload: Payload) -> Self {
        Self { name: name.into(), class: class.into(), payload }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        if self.class.is_empty() {
            return Err(Error::ProtocolViolation(format!("argument '{}' has no class", self.name)));
        }
        enc.map_begin()?;
        enc.field_str("name", &self.name)?;
        enc.field_str("ueClass", &self.class)?;
        enc.variant_begin("value")?;
        self.payload.encode(enc)?;
        enc.variant_end()?;
        enc.map_end()?;
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self> {
        let mut map = dec.map()?;
        let mut name = None;
        let mut class = None;
        let mut payload = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "name" => name = Some(val.str()?.to_string()),
                "ueClass" => class = Some(val.str()?.to_string()),
                "value" => payload = Some(Payload::decode(&mut val)?),
                _ => val.skip()?,
            }
        }

        let class = class.ok_or(Error::MissingField("ueClass"))?;
        if class.is_empty() {
            return Err(Error::ProtocolViolation("argument with empty class".into()));
        }

        Ok(Self {
            name: name.unwrap_or_default(),
            class,
            payload: payload.ok_or(Error::MissingField("value"))?,
        })
    }
}

/// Encodes a list of wire values.
pub fn encode_values(enc: &mut Encoder, values: &[WireValue]) -> Result<()> {
    enc.list_begin()?;
    for value in values {
        value.encode(enc)?;
    }
    enc.list_end()?;
    Ok(())
}

/// Decodes a list of wire values. Fails as a whole if any item fails.
pub fn decode_values(dec: &mut Decoder) -> Result<Vec<WireValue>> {
    let mut list = dec.list()?;
    let mut values = Vec::new();
    while let Some(mut item) = list.next()? {
        values.push(WireValue::decode(&mut item)?);
    }
    Ok(values)
}
