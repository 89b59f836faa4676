//! Bridge operations against a scripted engine.

use std::sync::Arc;

use enginebridge::Argument;
use enginebridge::BridgeClient;
use enginebridge::BridgeConfig;
use enginebridge::BridgeError;
use enginebridge::ClassName;
use enginebridge::ClassRegistry;
use enginebridge::ConnectionErrorKind;
use enginebridge::Connector;
use enginebridge::HostObject;
use enginebridge::HostValue;
use enginebridge::OwnerToken;
use enginebridge::RemoteHandle;
use enginebridge::mock_transport::FakeConnector;
use enginebridge::mock_transport::FakeEngine;
use enginebridge::mock_transport::Reply;
use enginebridge::mock_transport::default_response;
use enginebridge::transport;
use enginebridge::transport::Transport;
use enginepack::Decoder;
use enginepack::Encoder;
use enginerpc::FailureKind;
use enginerpc::Method;
use enginerpc::ObjectRef;
use enginerpc::Payload;
use enginerpc::RemoteFailure;
use enginerpc::ReplyEncoder;
use enginerpc::Request;
use enginerpc::Response;
use enginerpc::RpcFrame;
use enginerpc::WireValue;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

fn class(name: &str) -> ClassName {
    ClassName::new(name).unwrap()
}

fn client(engine: &FakeEngine) -> (BridgeClient, Arc<FakeConnector>) {
    let registry = Arc::new(ClassRegistry::new());
    registry.register_proxy("Foo").unwrap();
    registry.register_proxy("MyObject").unwrap();

    let connector = Arc::new(FakeConnector::new(engine.clone(), [60001]));
    let client = BridgeClient::with_connector(BridgeConfig::default(), registry, connector.clone()).unwrap();
    (client, connector)
}

fn engine<F>(handler: F) -> FakeEngine
where
    F: Fn(&Request) -> Option<Reply> + Send + Sync + 'static,
{
    FakeEngine::new(move |request| handler(request).unwrap_or_else(|| Ok(default_response(request))))
}

#[tokio::test]
async fn test_construct_returns_engine_handle() {
    let engine = engine(|request| match request {
        Request::NewObject { .. } => Some(Ok(Response::NewObject { object: ObjectRef::new(0xABCD, "A1") })),
        _ => None,
    });
    let (client, _) = client(&engine);
    let owner = OwnerToken::mint();

    let args = [
        Argument::new("X", class("Vector2D"), HostValue::Float(1.0)),
        Argument::new("Y", class("Vector2D"), HostValue::Float(2.0)),
    ];
    let handle = client.construct(&class("Vector2D"), 0, "test_vector", &args, owner).await.unwrap();

    assert_eq!(handle.address(), 0xABCD);
    assert_eq!(handle.display_name(), "A1");

    let requests = engine.requests().await;
    let Request::NewObject { ue_class, obj_name, own, construct_args, .. } = &requests[0] else {
        panic!("expected newObject");
    };
    assert_eq!(ue_class, "Vector2D");
    assert_eq!(obj_name, "test_vector");
    assert_eq!(own, &ObjectRef::new(owner.value(), "test_vector"));
    assert_eq!(construct_args.len(), 2);
    assert_eq!(construct_args[1], WireValue::new("Y", "Vector2D", Payload::Float(2.0)));
}

#[tokio::test]
async fn test_construct_failure_is_construction_failed() {
    let engine = engine(|request| match request {
        Request::NewObject { .. } => Some(Err(RemoteFailure::failed("abstract class").at("Server.cpp", 88))),
        _ => None,
    });
    let (client, _) = client(&engine);

    let err = client.construct(&class("Widget"), 0, "w", &[], OwnerToken::mint()).await.unwrap_err();
    let BridgeError::ConstructionFailed(failure) = err else { panic!("expected ConstructionFailed") };
    assert_eq!(failure.to_string(), "[Server.cpp]:[88]: abstract class");
}

#[tokio::test]
async fn test_destroy_reports_engine_result() {
    let engine = engine(|request| match request {
        Request::DestroyObject { own } => Some(Ok(Response::DestroyObject { result: own.address == 0xABCD })),
        _ => None,
    });
    let (client, _) = client(&engine);

    assert!(client.destroy(&RemoteHandle::new(0xABCD, "A1")).await.unwrap());
    assert!(!client.destroy(&RemoteHandle::new(0xDEAD, "gone")).await.unwrap());
    assert!(!client.destroy(&OwnerToken::from_raw(7)).await.unwrap());
}

#[tokio::test]
async fn test_encoding_failure_never_touches_the_engine() {
    let engine = FakeEngine::permissive();
    let (client, connector) = client(&engine);

    let args = [
        Argument::new("a", class("MyObject"), HostValue::Int(1)),
        Argument::new("b", class("MyObject"), HostValue::Int(2)),
        Argument::new("c", class("MyObject"), HostValue::Unclassified("generator".into())),
        Argument::new("d", class("MyObject"), HostValue::Int(4)),
        Argument::new("e", class("MyObject"), HostValue::Int(5)),
    ];
    let this = RemoteHandle::new(0x10, "obj");
    let err = client.call_method(OwnerToken::mint(), &class("MyObject"), &this, "Add5", &args).await.unwrap_err();

    assert!(matches!(err, BridgeError::Encoding(_)));
    assert_eq!(engine.writes(), 0);
    assert!(connector.attempts().await.is_empty());
}

#[tokio::test]
async fn test_call_returns_value_then_out_params() {
    let engine = engine(|request| match request {
        Request::CallFunction { func_name, .. } if func_name == "Split" => Some(Ok(Response::CallFunction {
            ret: WireValue::new("ReturnValue", "int", Payload::Int(3)),
            out_params: vec![
                WireValue::new("Remainder", "float", Payload::Float(0.5)),
                WireValue::new("Label", "FString", Payload::Str("ok".into())),
            ],
        })),
        _ => None,
    });
    let (client, _) = client(&engine);

    let this = RemoteHandle::new(0x10, "obj");
    let result = client.call_method(OwnerToken::mint(), &class("MyObject"), &this, "Split", &[]).await.unwrap();

    assert_eq!(
        result.values,
        vec![HostValue::Int(3), HostValue::Float(0.5), HostValue::Str("ok".into())]
    );
    assert_eq!(result.return_value(), Some(&HostValue::Int(3)));
    assert_eq!(result.out_params().len(), 2);
}

#[tokio::test]
async fn test_void_return_yields_no_values() {
    let engine = engine(|request| match request {
        Request::CallFunction { .. } => Some(Ok(Response::CallFunction {
            ret: WireValue::new("ReturnValue", "void", Payload::Bool(false)),
            out_params: vec![WireValue::new("Ignored", "int", Payload::Int(1))],
        })),
        _ => None,
    });
    let (client, _) = client(&engine);

    let this = RemoteHandle::new(0x10, "obj");
    let result = client.call_method(OwnerToken::mint(), &class("MyObject"), &this, "Tick", &[]).await.unwrap();
    assert!(result.is_empty());

    let result = client.call_static(&class("MyObject"), "Reset", &[]).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_returned_reference_becomes_registered_proxy() {
    let engine = engine(|request| match request {
        Request::CallStaticFunction { .. } => Some(Ok(Response::CallStaticFunction {
            ret: WireValue::new("ReturnValue", "Foo", Payload::Object(ObjectRef::new(0x1000, "bar"))),
            out_params: vec![],
        })),
        _ => None,
    });
    let (client, _) = client(&engine);

    let result = client.call_static(&class("Foo"), "Make", &[]).await.unwrap();
    let proxy = result.return_value().and_then(|v| v.as_proxy()).expect("proxy");

    assert_eq!(proxy.handle(), Some(RemoteHandle::new(0x1000, "bar")));
    assert_eq!(proxy.class_name().as_str(), "Foo");
    assert_eq!(engine.count(Method::RegisterCreatedPyObject).await, 1);
}

#[tokio::test]
async fn test_materialize_is_deterministic_without_dedup() {
    let engine = engine(|request| match request {
        Request::CallStaticFunction { .. } => Some(Ok(Response::CallStaticFunction {
            ret: WireValue::new("ReturnValue", "Foo", Payload::Object(ObjectRef::new(0x1000, "bar"))),
            out_params: vec![],
        })),
        _ => None,
    });
    let (client, _) = client(&engine);

    let first = client.call_static(&class("Foo"), "Get", &[]).await.unwrap();
    let second = client.call_static(&class("Foo"), "Get", &[]).await.unwrap();
    let a = first.return_value().and_then(|v| v.as_proxy()).unwrap();
    let b = second.return_value().and_then(|v| v.as_proxy()).unwrap();

    assert_ne!(a.token(), b.token());
    assert_eq!(a.handle(), b.handle());
    assert_eq!(engine.count(Method::RegisterCreatedPyObject).await, 2);
}

#[tokio::test]
async fn test_out_param_reference_is_not_registered() {
    let engine = engine(|request| match request {
        Request::CallFunction { .. } => Some(Ok(Response::CallFunction {
            ret: WireValue::new("ReturnValue", "bool", Payload::Bool(true)),
            out_params: vec![WireValue::new("Hit", "Foo", Payload::Object(ObjectRef::new(0x2000, "hit")))],
        })),
        Request::GetProperty { .. } => Some(Ok(Response::GetProperty {
            property: WireValue::new("Owner", "Foo", Payload::Object(ObjectRef::new(0x3000, "owner"))),
        })),
        _ => None,
    });
    let (client, _) = client(&engine);
    let owner = OwnerToken::mint();

    let this = RemoteHandle::new(0x10, "obj");
    let result = client.call_method(owner, &class("MyObject"), &this, "Trace", &[]).await.unwrap();
    assert_eq!(result.values[0], HostValue::Bool(true));
    assert_eq!(result.values[1], HostValue::Handle(RemoteHandle::new(0x2000, "hit")));

    let property = client.get_property(owner, &class("MyObject"), "Owner").await.unwrap();
    assert_eq!(property, HostValue::Handle(RemoteHandle::new(0x3000, "owner")));

    assert_eq!(engine.count(Method::RegisterCreatedPyObject).await, 0);
}

#[tokio::test]
async fn test_unknown_returned_class_is_lookup_error() {
    let engine = engine(|request| match request {
        Request::CallStaticFunction { .. } => Some(Ok(Response::CallStaticFunction {
            ret: WireValue::new("ReturnValue", "Unregistered", Payload::Object(ObjectRef::new(1, "x"))),
            out_params: vec![],
        })),
        _ => None,
    });
    let (client, _) = client(&engine);

    let err = client.call_static(&class("Unregistered"), "Make", &[]).await.unwrap_err();
    assert_eq!(err, BridgeError::Lookup("Unregistered".into()));
}

#[tokio::test]
async fn test_property_roundtrip() {
    let engine = engine(|request| match request {
        Request::GetProperty { property_name, .. } => Some(Ok(Response::GetProperty {
            property: WireValue::new(property_name.clone(), "float", Payload::Float(6.0)),
        })),
        _ => None,
    });
    let (client, _) = client(&engine);
    let owner = OwnerToken::mint();

    let value = Argument::new("X", class("Vector2D"), HostValue::Float(6.0));
    client.set_property(owner, &class("Vector2D"), &value).await.unwrap();
    let read = client.get_property(owner, &class("Vector2D"), "X").await.unwrap();
    assert_eq!(read, HostValue::Float(6.0));

    let requests = engine.requests().await;
    assert_eq!(
        requests[0],
        Request::SetProperty {
            ue_class: "Vector2D".into(),
            owner: ObjectRef::address_only(owner.value()),
            property: WireValue::new("X", "Vector2D", Payload::Float(6.0)),
        }
    );
}

#[tokio::test]
async fn test_remote_failure_is_surfaced_verbatim() {
    let engine = engine(|request| match request {
        Request::CallFunction { .. } => Some(Err(RemoteFailure::failed("no function Add3").at("UnrealCore.cpp", 301))),
        _ => None,
    });
    let (client, _) = client(&engine);

    let this = RemoteHandle::new(0x10, "obj");
    let err = client.call_method(OwnerToken::mint(), &class("MyObject"), &this, "Add3", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "[UnrealCore.cpp]:[301]: no function Add3");
    assert!(client.port().await.is_some());
}

#[tokio::test]
async fn test_disconnected_failure_drops_connection() {
    let engine = engine(|request| match request {
        Request::CallStaticFunction { .. } => Some(Err(RemoteFailure::new(FailureKind::Disconnected, "world unloaded"))),
        _ => None,
    });
    let (client, connector) = client(&engine);

    let err = client.call_static(&class("MyObject"), "Ping", &[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Connection { kind: ConnectionErrorKind::Disconnected, .. }));
    assert_eq!(client.port().await, None);

    assert!(client.destroy(&RemoteHandle::new(1, "x")).await.unwrap());
    assert_eq!(connector.attempts().await, vec![60001, 60001]);
}

/// Answers the static function `Broken` with a return value of a kind the
/// bridge does not know, and everything else with the neutral reply.
struct GarblingTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait::async_trait]
impl Transport for GarblingTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let RpcFrame::Call(call) = RpcFrame::decode(&mut Decoder::new(payload)).unwrap() else {
            panic!("client sent a reply frame");
        };
        let reply = match call.request().unwrap() {
            Request::CallStaticFunction { func_name, .. } if func_name == "Broken" => garbled_reply(call.seq),
            request => ReplyEncoder::ok(call.seq, &default_response(&request)).to_bytes().unwrap(),
        };
        self.tx.send(reply).unwrap();
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.rx.lock().await.recv().await)
    }
}

struct GarblingConnector;

#[async_trait::async_trait]
impl Connector for GarblingConnector {
    async fn connect(&self, _host: &str, _port: u16) -> transport::Result<Box<dyn Transport>> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Box::new(GarblingTransport { tx, rx: Mutex::new(rx) }))
    }
}

fn garbled_reply(seq: u64) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.variant_begin("Reply").unwrap();
    enc.result_ok_begin().unwrap();
    enc.map_begin().unwrap();
    enc.field_u64("seq", seq).unwrap();
    enc.variant_begin("results").unwrap();
    enc.map_begin().unwrap();
    enc.variant_begin("return").unwrap();
    enc.map_begin().unwrap();
    enc.field_str("name", "ReturnValue").unwrap();
    enc.field_str("ueClass", "int").unwrap();
    enc.variant_begin("value").unwrap();
    enc.variant_begin("bogusValue").unwrap();
    enc.s64(7).unwrap();
    enc.variant_end().unwrap();
    enc.variant_end().unwrap();
    enc.map_end().unwrap();
    enc.variant_end().unwrap();
    enc.map_end().unwrap();
    enc.variant_end().unwrap();
    enc.map_end().unwrap();
    enc.result_ok_end().unwrap();
    enc.variant_end().unwrap();
    enc.into_bytes().unwrap()
}

#[tokio::test]
async fn test_unknown_value_kind_fails_only_its_call() {
    let registry = Arc::new(ClassRegistry::new());
    let client = BridgeClient::with_connector(BridgeConfig::default(), registry, Arc::new(GarblingConnector)).unwrap();
    let foo = class("Foo");

    let err = client.call_static(&foo, "Broken", &[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Decoding(ref detail) if detail.contains("bogusValue")), "{:?}", err);
    assert_eq!(client.port().await, Some(60001));

    let result = client.call_static(&foo, "Fine", &[]).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(client.port().await, Some(60001));
}
