//! Calculator — a `calculate` method that delegates to the addition service
//! through a discovery registry.
//!
//! Start `cargo run --example addition` first, then:
//!
//! ```sh
//! cargo run --example calculator
//! curl -X POST -d '{"A":2,"B":3}' http://127.0.0.1:8081/calculate
//! ```

use hive::{Discovery, HiveError, Method, Service, ServiceConfig};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct AddRequest {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Serialize, Deserialize)]
struct AddResponse {
    #[serde(rename = "Result")]
    result: i64,
}

#[derive(Deserialize)]
struct CalculateRequest {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Serialize)]
struct CalculateResponse {
    #[serde(rename = "Result")]
    result: i64,
}

#[tokio::main]
async fn main() -> Result<(), HiveError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Client-side handle for the addition service; the method must be
    // registered here too so the call can be resolved before dispatch.
    let mut addition_config = ServiceConfig::new("addition", "0.1.0");
    addition_config.dns_name = "127.0.0.1".to_string();
    addition_config.socket = ":8080".to_string();
    let addition = Service::with_config(addition_config);
    addition.register(Method::new("add", |req: AddRequest| async move {
        Ok(AddResponse {
            result: req.a + req.b,
        })
    }));

    // Fail fast if the addition service is not up yet.
    let probe: AddResponse = addition.send("add", &AddRequest { a: 0, b: 0 }).await?;
    tracing::info!(result = probe.result, "addition service reachable");

    let discovery = Discovery::new();
    discovery.register(addition);

    let mut config = ServiceConfig::new("randomcalc", "0.1.0");
    config.dns_name = "127.0.0.1".to_string();
    config.socket = ":8081".to_string();
    let service = Service::with_config(config);

    let registry = discovery.clone();
    service.register(Method::new("calculate", move |req: CalculateRequest| {
        let discovery = registry.clone();
        async move {
            let response: AddResponse = discovery
                .send("addition", "add", &AddRequest { a: req.a, b: req.b })
                .await?;
            Ok(CalculateResponse {
                result: response.result,
            })
        }
    }));

    service.run().await
}
