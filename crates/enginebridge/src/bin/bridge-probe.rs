//! Checks that an engine is reachable.
//!
//! ```text
//! bridge-probe                      # connect and report the port
//! bridge-probe <Class> <Function>   # also call a static function
//! ```
//!
//! Connection settings come from the `ENGINE_BRIDGE_*` variables.

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use enginebridge::BridgeClient;
use enginebridge::BridgeConfig;
use enginebridge::ClassName;
use enginebridge::ClassRegistry;
use enginebridge::HostObject;
use enginebridge::HostValue;
use enginebridge::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let call = match args.as_slice() {
        [] => None,
        [class, function] => Some((ClassName::new(class.as_str())?, function.clone())),
        _ => bail!("usage: bridge-probe [<Class> <Function>]"),
    };

    let config = BridgeConfig::from_env()?;
    info!(host = %config.host, ports = ?config.ports(), "probing for engine");

    let registry = Arc::new(ClassRegistry::new());
    if let Some((class, _)) = &call {
        registry.register_proxy(class.as_str())?;
    }
    let client = BridgeClient::new(config, registry)?;
    let port = client.connect().await.context("engine not reachable")?;
    println!("engine listening on port {}", port);

    if let Some((class, function)) = call {
        let result = client
            .call_static(&class, &function, &[])
            .await
            .with_context(|| format!("{}::{} failed", class, function))?;

        if result.is_empty() {
            println!("{}::{} returned nothing", class, function);
        }
        for (i, value) in result.values.iter().enumerate() {
            println!("[{}] {}", i, render(value));
        }
    }

    client.shutdown().await;
    Ok(())
}

fn render(value: &HostValue) -> String {
    match value {
        HostValue::None => "none".into(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Uint(u) => u.to_string(),
        HostValue::Int(i) => i.to_string(),
        HostValue::Float(f) => f.to_string(),
        HostValue::Str(s) => format!("{:?}", s),
        HostValue::Enum(ordinal) => format!("enum({})", ordinal),
        HostValue::Handle(handle) => handle.to_string(),
        HostValue::Object(token) => token.to_string(),
        HostValue::Proxy(proxy) => match proxy.handle() {
            Some(handle) => format!("{} proxy for {}", proxy.class_name(), handle),
            None => format!("{} proxy", proxy.class_name()),
        },
        HostValue::Unclassified(type_name) => format!("<{}>", type_name),
    }
}
