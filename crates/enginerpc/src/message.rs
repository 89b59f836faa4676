//! # Verb Messages
//!
//! Request parameters and response results for the seven procedures the
//! engine exposes on its bootstrap interface.
//!
//! Field names follow the engine schema (`ueClass`, `objName`, `outParams`...).
//! Both directions are implemented so that test doubles and any engine-side
//! implementation share one definition of the protocol.

use enginepack::Decoder;
use enginepack::Encoder;

use crate::error::Error;
use crate::error::Result;
use crate::value::ObjectRef;
use crate::value::WireValue;
use crate::value::decode_values;
use crate::value::encode_values;

/// The remote-callable procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    NewObject,
    DestroyObject,
    CallFunction,
    CallStaticFunction,
    GetProperty,
    SetProperty,
    RegisterCreatedPyObject,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::NewObject,
        Method::DestroyObject,
        Method::CallFunction,
        Method::CallStaticFunction,
        Method::GetProperty,
        Method::SetProperty,
        Method::RegisterCreatedPyObject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewObject => "newObject",
            Self::DestroyObject => "destroyObject",
            Self::CallFunction => "callFunction",
            Self::CallStaticFunction => "callStaticFunction",
            Self::GetProperty => "getProperty",
            Self::SetProperty => "setProperty",
            Self::RegisterCreatedPyObject => "registerCreatedPyObject",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| Error::UnknownVariant(format!("method: {}", name)))
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    NewObject {
        ue_class: String,
        flags: u32,
        obj_name: String,
        own: ObjectRef,
        construct_args: Vec<WireValue>,
    },
    DestroyObject {
        own: ObjectRef,
    },
    CallFunction {
        own: ObjectRef,
        ue_class: String,
        call_object: ObjectRef,
        func_name: String,
        params: Vec<WireValue>,
    },
    CallStaticFunction {
        ue_class: String,
        func_name: String,
        params: Vec<WireValue>,
    },
    GetProperty {
        ue_class: String,
        owner: ObjectRef,
        property_name: String,
    },
    SetProperty {
        ue_class: String,
        owner: ObjectRef,
        property: WireValue,
    },
    RegisterCreatedPyObject {
        py_object: ObjectRef,
        unreal_object: ObjectRef,
        ue_class: String,
    },
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Self::NewObject { .. } => Method::NewObject,
            Self::DestroyObject { .. } => Method::DestroyObject,
            Self::CallFunction { .. } => Method::CallFunction,
            Self::CallStaticFunction { .. } => Method::CallStaticFunction,
            Self::GetProperty { .. } => Method::GetProperty,
            Self::SetProperty { .. } => Method::SetProperty,
            Self::RegisterCreatedPyObject { .. } => Method::RegisterCreatedPyObject,
        }
    }

    /// Encodes the parameter map.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.map_begin()?;
        match self {
            Self::NewObject { ue_class, flags, obj_name, own, construct_args } => {
                enc.field_str("ueClass", ue_class)?;
                enc.field_u32("flags", *flags)?;
                enc.field_str("objName", obj_name)?;
                write_ref(enc, "own", own)?;
                write_values(enc, "constructArgs", construct_args)?;
            }
            Self::DestroyObject { own } => {
                write_ref(enc, "own", own)?;
            }
            Self::CallFunction { own, ue_class, call_object, func_name, params } => {
                write_ref(enc, "own", own)?;
                enc.field_str("ueClass", ue_class)?;
                write_ref(enc, "callObject", call_object)?;
                enc.field_str("funcName", func_name)?;
                write_values(enc, "params", params)?;
            }
            Self::CallStaticFunction { ue_class, func_name, params } => {
                enc.field_str("ueClass", ue_class)?;
                enc.field_str("funcName", func_name)?;
                write_values(enc, "params", params)?;
            }
            Self::GetProperty { ue_class, owner, property_name } => {
                enc.field_str("ueClass", ue_class)?;
                write_ref(enc, "owner", owner)?;
                enc.field_str("propertyName", property_name)?;
            }
            Self::SetProperty { ue_class, owner, property } => {
                enc.field_str("ueClass", ue_class)?;
                write_ref(enc, "owner", owner)?;
                enc.variant_begin("property")?;
                property.encode(enc)?;
                enc.variant_end()?;
            }
            Self::RegisterCreatedPyObject { py_object, unreal_object, ue_class } => {
                write_ref(enc, "pyObject", py_object)?;
                write_ref(enc, "unrealObject", unreal_object)?;
                enc.field_str("ueClass", ue_class)?;
            }
        }
        enc.map_end()?;
        Ok(())
    }

    /// Decodes the parameter map of `method`.
    pub fn decode(method: Method, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::read(dec)?;
        let request = match method {
            Method::NewObject => Self::NewObject {
                ue_class: f.string("ueClass")?,
                flags: f.flags.unwrap_or(0),
                obj_name: f.obj_name.clone().unwrap_or_default(),
                own: f.reference("own")?,
                construct_args: f.values.get("constructArgs").cloned().unwrap_or_default(),
            },
            Method::DestroyObject => Self::DestroyObject {
                own: f.reference("own")?,
            },
            Method::CallFunction => Self::CallFunction {
                own: f.reference("own")?,
                ue_class: f.string("ueClass")?,
                call_object: f.reference("callObject")?,
                func_name: f.string("funcName")?,
                params: f.values.get("params").cloned().unwrap_or_default(),
            },
            Method::CallStaticFunction => Self::CallStaticFunction {
                ue_class: f.string("ueClass")?,
                func_name: f.string("funcName")?,
                params: f.values.get("params").cloned().unwrap_or_default(),
            },
            Method::GetProperty => Self::GetProperty {
                ue_class: f.string("ueClass")?,
                owner: f.reference("owner")?,
                property_name: f.string("propertyName")?,
            },
            Method::SetProperty => Self::SetProperty {
                ue_class: f.string("ueClass")?,
                owner: f.reference("owner")?,
                property: f.value("property")?,
            },
            Method::RegisterCreatedPyObject => Self::RegisterCreatedPyObject {
                py_object: f.reference("pyObject")?,
                unreal_object: f.reference("unrealObject")?,
                ue_class: f.string("ueClass")?,
            },
        };
        Ok(request)
    }
}

/// Results of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    NewObject { object: ObjectRef },
    DestroyObject { result: bool },
    CallFunction { ret: WireValue, out_params: Vec<WireValue> },
    CallStaticFunction { ret: WireValue, out_params: Vec<WireValue> },
    GetProperty { property: WireValue },
    SetProperty,
    RegisterCreatedPyObject,
}

impl Response {
    pub fn method(&self) -> Method {
        match self {
            Self::NewObject { .. } => Method::NewObject,
            Self::DestroyObject { .. } => Method::DestroyObject,
            Self::CallFunction { .. } => Method::CallFunction,
            Self::CallStaticFunction { .. } => Method::CallStaticFunction,
            Self::GetProperty { .. } => Method::GetProperty,
            Self::SetProperty => Method::SetProperty,
            Self::RegisterCreatedPyObject => Method::RegisterCreatedPyObject,
        }
    }

    /// Encodes the results map.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.map_begin()?;
        match self {
            Self::NewObject { object } => write_ref(enc, "object", object)?,
            Self::DestroyObject { result } => enc.field_bool("result", *result)?,
            Self::CallFunction { ret, out_params } | Self::CallStaticFunction { ret, out_params } => {
                enc.variant_begin("return")?;
                ret.encode(enc)?;
                enc.variant_end()?;
                write_values(enc, "outParams", out_params)?;
            }
            Self::GetProperty { property } => {
                enc.variant_begin("property")?;
                property.encode(enc)?;
                enc.variant_end()?;
            }
            Self::SetProperty | Self::RegisterCreatedPyObject => {}
        }
        enc.map_end()?;
        Ok(())
    }

    /// Decodes the results map of `method`.
    pub fn decode(method: Method, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::read(dec)?;
        let response = match method {
            Method::NewObject => Self::NewObject { object: f.reference("object")? },
            Method::DestroyObject => Self::DestroyObject { result: f.result.ok_or(Error::MissingField("result"))? },
            Method::CallFunction => Self::CallFunction {
                ret: f.value("return")?,
                out_params: f.values.get("outParams").cloned().unwrap_or_default(),
            },
            Method::CallStaticFunction => Self::CallStaticFunction {
                ret: f.value("return")?,
                out_params: f.values.get("outParams").cloned().unwrap_or_default(),
            },
            Method::GetProperty => Self::GetProperty { property: f.value("property")? },
            Method::SetProperty => Self::SetProperty,
            Method::RegisterCreatedPyObject => Self::RegisterCreatedPyObject,
        };
        Ok(response)
    }
}

fn write_ref(enc: &mut Encoder, key: &str, obj: &ObjectRef) -> Result<()> {
    enc.variant_begin(key)?;
    obj.encode(enc)?;
    enc.variant_end()?;
    Ok(())
}

fn write_values(enc: &mut Encoder, key: &str, values: &[WireValue]) -> Result<()> {
    enc.variant_begin(key)?;
    encode_values(enc, values)?;
    enc.variant_end()?;
    Ok(())
}

/// Every field any message can carry, keyed by wire name.
///
/// Messages share field names and shapes, so one pass collects them all and
/// each message picks what it requires. Unknown keys are skipped.
#[derive(Default)]
struct Fields {
    strings: Vec<(&'static str, String)>,
    refs: Vec<(&'static str, ObjectRef)>,
    single: Vec<(&'static str, WireValue)>,
    values: std::collections::HashMap<&'static str, Vec<WireValue>>,
    flags: Option<u32>,
    obj_name: Option<String>,
    result: Option<bool>,
}

const STRING_KEYS: [&str; 3] = ["ueClass", "funcName", "propertyName"];
const REF_KEYS: [&str; 6] = ["own", "callObject", "owner", "pyObject", "unrealObject", "object"];
const VALUE_KEYS: [&str; 2] = ["return", "property"];
const LIST_KEYS: [&str; 3] = ["constructArgs", "params", "outParams"];

impl Fields {
    fn read(dec: &mut Decoder) -> Result<Self> {
        let mut fields = Self::default();
        let mut map = dec.map()?;

        while let Some((key, mut val)) = map.next()? {
            if let Some(k) = STRING_KEYS.iter().find(|k| **k == key) {
                fields.strings.push((*k, val.str()?.to_string()));
            } else if let Some(k) = REF_KEYS.iter().find(|k| **k == key) {
                fields.refs.push((*k, ObjectRef::decode(&mut val)?));
            } else if let Some(k) = VALUE_KEYS.iter().find(|k| **k == key) {
                fields.single.push((*k, WireValue::decode(&mut val)?));
            } else if let Some(k) = LIST_KEYS.iter().find(|k| **k == key) {
                fields.values.insert(*k, decode_values(&mut val)?);
            } else {
                match key {
                    "flags" => fields.flags = Some(val.u32()?),
                    "objName" => fields.obj_name = Some(val.str()?.to_string()),
                    "result" => fields.result = Some(val.bool()?),
                    _ => val.skip()?,
                }
            }
        }

        Ok(fields)
    }

    fn string(&self, key: &'static str) -> Result<String> {
        lookup(&self.strings, key)
    }

    fn reference(&self, key: &'static str) -> Result<ObjectRef> {
        lookup(&self.refs, key)
    }

    fn value(&self, key: &'static str) -> Result<WireValue> {
        lookup(&self.single, key)
    }
}

fn lookup<T: Clone>(entries: &[(&'static str, T)], key: &'static str) -> Result<T> {
    entries
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .ok_or(Error::MissingField(key))
}
