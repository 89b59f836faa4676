use crate::*;
use enginepack::Decoder;
use enginepack::Encoder;

fn value_roundtrip(value: &WireValue) -> WireValue {
    let mut enc = Encoder::new();
    value.encode(&mut enc).expect("encoding failed");
    let bytes = enc.into_bytes().expect("scopes open");
    WireValue::decode(&mut Decoder::new(&bytes)).expect("decoding failed")
}

fn call_roundtrip(request: &Request) -> Request {
    let bytes = CallEncoder::new(7, request).to_bytes().expect("encoding failed");
    let RpcFrame::Call(call) = RpcFrame::decode(&mut Decoder::new(&bytes)).unwrap() else {
        panic!("expected Call frame");
    };
    assert_eq!(call.seq, 7);
    assert_eq!(call.method, request.method());
    call.request().expect("request decoding failed")
}

fn reply_roundtrip(response: &Response) -> Response {
    let bytes = ReplyEncoder::ok(9, response).to_bytes().expect("encoding failed");
    let RpcFrame::Reply(reply) = RpcFrame::decode(&mut Decoder::new(&bytes)).unwrap() else {
        panic!("expected Reply frame");
    };
    assert_eq!(reply.seq, 9);
    reply.response(response.method()).unwrap().expect("expected success")
}

#[test]
fn test_wire_value_primitive_boundaries() {
    let cases = [
        Payload::Bool(true),
        Payload::Bool(false),
        Payload::Uint(u64::MAX),
        Payload::Int(i64::MIN),
        Payload::Int(-42),
        Payload::Float(f64::INFINITY),
        Payload::Float(f64::NEG_INFINITY),
        Payload::Str(String::new()),
        Payload::Enum(2),
    ];
    for payload in cases {
        let value = WireValue::new("X", "Vector2D", payload);
        assert_eq!(value_roundtrip(&value), value);
    }
}

#[test]
fn test_wire_value_nan_survives() {
    let value = WireValue::new("f", "float", Payload::Float(f64::NAN));
    let Payload::Float(f) = value_roundtrip(&value).payload else { panic!("wrong kind") };
    assert!(f.is_nan());
}

#[test]
fn test_wire_value_object_reference() {
    let value = WireValue::new("Vector", "Vector2D", Payload::Object(ObjectRef::new(0x1000, "bar")));
    assert_eq!(value_roundtrip(&value), value);
}

#[test]
fn test_wire_value_empty_class_rejected_on_encode() {
    let value = WireValue::new("a", "", Payload::Int(1));
    let mut enc = Encoder::new();
    assert!(matches!(value.encode(&mut enc), Err(Error::ProtocolViolation(_))));
}

#[test]
fn test_wire_value_unknown_kind_is_unknown_variant() {
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    enc.field_str("name", "a").unwrap();
    enc.field_str("ueClass", "Thing").unwrap();
    enc.variant_begin("value").unwrap();
    enc.variant_begin("listValue").unwrap();
    enc.unit().unwrap();
    enc.variant_end().unwrap();
    enc.variant_end().unwrap();
    enc.map_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let err = WireValue::decode(&mut Decoder::new(&bytes)).unwrap_err();
    assert!(matches!(err, Error::UnknownVariant(ref s) if s.contains("listValue")));
}

#[test]
fn test_new_object_request_roundtrip() {
    let request = Request::NewObject {
        ue_class: "Vector2D".into(),
        flags: 3,
        obj_name: "test_vector".into(),
        own: ObjectRef::new(0xdead_beef, "test_vector"),
        construct_args: vec![
            WireValue::new("X", "Vector2D", Payload::Float(1.0)),
            WireValue::new("Y", "Vector2D", Payload::Float(2.0)),
        ],
    };
    assert_eq!(call_roundtrip(&request), request);
}

#[test]
fn test_every_request_roundtrips() {
    let arg = WireValue::new("a", "MyObject", Payload::Int(3));
    let requests = vec![
        Request::DestroyObject { own: ObjectRef::address_only(11) },
        Request::CallFunction {
            own: ObjectRef::address_only(12),
            ue_class: "MyObject".into(),
            call_object: ObjectRef::new(0xABCD, "A1"),
            func_name: "Add2".into(),
            params: vec![arg.clone()],
        },
        Request::CallStaticFunction {
            ue_class: "MyObject".into(),
            func_name: "Make".into(),
            params: vec![],
        },
        Request::GetProperty {
            ue_class: "Vector2D".into(),
            owner: ObjectRef::address_only(13),
            property_name: "X".into(),
        },
        Request::SetProperty {
            ue_class: "Vector2D".into(),
            owner: ObjectRef::address_only(13),
            property: WireValue::new("X", "Vector2D", Payload::Float(6.0)),
        },
        Request::RegisterCreatedPyObject {
            py_object: ObjectRef::address_only(14),
            unreal_object: ObjectRef::new(0x1000, "bar"),
            ue_class: "Foo".into(),
        },
    ];
    for request in requests {
        assert_eq!(call_roundtrip(&request), request);
    }
}

#[test]
fn test_every_response_roundtrips() {
    let ret = WireValue::new("ReturnValue", "int", Payload::Int(7));
    let responses = vec![
        Response::NewObject { object: ObjectRef::new(0xABCD, "A1") },
        Response::DestroyObject { result: true },
        Response::DestroyObject { result: false },
        Response::CallFunction {
            ret: ret.clone(),
            out_params: vec![WireValue::new("Out", "Vector2D", Payload::Object(ObjectRef::address_only(5)))],
        },
        Response::CallStaticFunction { ret, out_params: vec![] },
        Response::GetProperty { property: WireValue::new("X", "float", Payload::Float(6.0)) },
        Response::SetProperty,
        Response::RegisterCreatedPyObject,
    ];
    for response in responses {
        assert_eq!(reply_roundtrip(&response), response);
    }
}

#[test]
fn test_failure_reply_carries_origin() {
    let failure = RemoteFailure::failed("no such function: Add3").at("UnrealCoreServer.cpp", 214);
    let bytes = ReplyEncoder::err(4, &failure).to_bytes().unwrap();

    let RpcFrame::Reply(reply) = RpcFrame::decode(&mut Decoder::new(&bytes)).unwrap() else {
        panic!("expected Reply frame");
    };
    assert_eq!(reply.seq, 4);
    let decoded = reply.response(Method::CallFunction).unwrap().unwrap_err();
    assert_eq!(decoded, failure);
    assert_eq!(decoded.to_string(), "[UnrealCoreServer.cpp]:[214]: no such function: Add3");
}

#[test]
fn test_failure_without_origin_displays_description() {
    let failure = RemoteFailure::new(FailureKind::Disconnected, "engine shutting down");
    assert_eq!(failure.to_string(), "engine shutting down");
}

#[test]
fn test_missing_required_field() {
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    enc.field_str("ueClass", "Foo").unwrap();
    enc.map_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let err = Request::decode(Method::GetProperty, &mut Decoder::new(&bytes)).unwrap_err();
    assert_eq!(err, Error::MissingField("owner"));
}

#[test]
fn test_destroy_reply_without_result_is_rejected() {
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    enc.map_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let err = Response::decode(Method::DestroyObject, &mut Decoder::new(&bytes)).unwrap_err();
    assert_eq!(err, Error::MissingField("result"));
}

#[test]
fn test_unknown_method_name() {
    assert!(matches!(Method::parse("spawnActor"), Err(Error::UnknownVariant(_))));
    for method in Method::ALL {
        assert_eq!(Method::parse(method.as_str()).unwrap(), method);
    }
}

#[test]
fn test_decode_seq_for_both_frame_types() {
    let request = Request::DestroyObject { own: ObjectRef::address_only(1) };
    let call = CallEncoder::new(21, &request).to_bytes().unwrap();
    assert_eq!(decode_seq(&call).unwrap(), 21);

    let failure = RemoteFailure::failed("boom");
    let reply = ReplyEncoder::err(22, &failure).to_bytes().unwrap();
    assert_eq!(decode_seq(&reply).unwrap(), 22);
}
