//! Addition service — serves a single `add` method.
//!
//! ```sh
//! cargo run --example addition
//! curl -X POST -d '{"A":2,"B":3}' http://127.0.0.1:8080/add
//! ```

use hive::{HiveError, Method, Service, ServiceConfig};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct AddRequest {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Serialize)]
struct AddResponse {
    #[serde(rename = "Result")]
    result: i64,
}

#[tokio::main]
async fn main() -> Result<(), HiveError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = ServiceConfig::new("addition", "0.1.0");
    config.dns_name = "127.0.0.1".to_string();
    config.socket = ":8080".to_string();

    let service = Service::with_config(config);
    service.register(Method::new("add", |req: AddRequest| async move {
        Ok(AddResponse {
            result: req.a + req.b,
        })
    }));

    service.run().await
}
