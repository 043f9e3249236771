//! End-to-end tests over real sockets: serving, calling, error mapping and
//! discovery-mediated dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hive::{
    Discovery, ErrorEntry, Method, RpcError, Service, ServiceConfig, ServiceInfo, ERR_GENERIC,
    ERR_NETWORK, ERR_REQUEST,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct AddRequest {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct AddResponse {
    #[serde(rename = "Result")]
    result: i64,
}

#[derive(Serialize, Deserialize)]
struct CalculateRequest {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct CalculateResponse {
    #[serde(rename = "Result")]
    result: i64,
}

/// Reserve a free local port. The listener is dropped before returning, so
/// the service binding it shortly after may race with other tests in theory;
/// the OS hands out distinct ephemeral ports in practice.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a loopback service bound to `port` with a short timeout.
fn loopback_service(name: &str, port: u16) -> Service {
    let mut config = ServiceConfig::new(name, "0.1.0");
    config.dns_name = "127.0.0.1".to_string();
    config.socket = format!(":{port}");
    config.timeout = Duration::from_secs(2);
    Service::with_config(config)
}

fn addition_service(port: u16) -> Service {
    let service = loopback_service("addition", port);
    service.register(Method::new("add", |req: AddRequest| async move {
        Ok(AddResponse {
            result: req.a + req.b,
        })
    }));
    service
}

/// Spawn `run` and block until the listening socket accepts connections.
async fn start(service: &Service, port: u16) {
    let svc = service.clone();
    tokio::spawn(async move {
        if let Err(e) = svc.run().await {
            eprintln!("service stopped: {e}");
        }
    });
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("service did not start on port {port}");
}

#[tokio::test]
async fn test_addition_end_to_end() {
    let port = free_port().await;
    let service = addition_service(port);
    start(&service, port).await;

    let response: AddResponse = service
        .send("add", &AddRequest { a: 2, b: 3 })
        .await
        .unwrap();
    assert_eq!(response, AddResponse { result: 5 });
}

#[tokio::test]
async fn test_successful_post_decodes_into_declared_response() {
    let port = free_port().await;
    let service = addition_service(port);
    start(&service, port).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/add"))
        .header("content-type", "application/json")
        .body(r#"{"A":2,"B":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: AddResponse = response.json().await.unwrap();
    assert_eq!(body, AddResponse { result: 5 });
}

#[tokio::test]
async fn test_malformed_json_yields_request_error() {
    let port = free_port().await;
    let service = addition_service(port);
    start(&service, port).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/add"))
        .header("content-type", "application/json")
        .body("{A:2,")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let err: RpcError = response.json().await.unwrap();
    assert_eq!(err.id, ERR_REQUEST);
    assert_eq!(err.status, 400);
    assert!(!err.text.is_empty(), "error text must carry the decode error");
}

#[tokio::test]
async fn test_introspection_method_at_root() {
    let port = free_port().await;
    let service = addition_service(port);
    start(&service, port).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let info: ServiceInfo = response.json().await.unwrap();
    assert_eq!(info.name, "addition");
    assert_eq!(info.version, "0.1.0");
    assert!(info.methods.contains(&"add".to_string()));
}

#[tokio::test]
async fn test_discovery_mediated_call() {
    let port = free_port().await;
    let addition = addition_service(port);
    start(&addition, port).await;

    let discovery = Discovery::new();
    discovery.register(addition);

    // randomcalc composes the addition service through discovery from
    // within its own handler; local forwarding keeps randomcalc itself off
    // the network while the addition call goes over the wire.
    let mut config = ServiceConfig::new("randomcalc", "0.1.0");
    config.forward_local = true;
    let randomcalc = Service::with_config(config);
    let registry = discovery.clone();
    randomcalc.register(Method::new("calculate", move |req: CalculateRequest| {
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

    let response: CalculateResponse = randomcalc
        .send("calculate", &CalculateRequest { a: 2, b: 3 })
        .await
        .unwrap();
    assert_eq!(response, CalculateResponse { result: 5 });
}

#[tokio::test]
async fn test_unknown_method_issues_no_network_call() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let service = loopback_service("calc", port);
    let err = service
        .send::<_, AddResponse>("missing", &AddRequest { a: 1, b: 2 })
        .await
        .unwrap_err();

    assert_eq!(err.id, ERR_GENERIC);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0, "no request may be issued");
}

#[tokio::test]
async fn test_marshal_failure_issues_no_network_call() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let service = addition_service(port);

    // JSON map keys must be strings; tuple keys fail to serialize.
    let unserializable: std::collections::HashMap<(i64, i64), i64> =
        [((1, 2), 3)].into_iter().collect();
    let err = service
        .send::<_, AddResponse>("add", &unserializable)
        .await
        .unwrap_err();

    assert_eq!(err.id, ERR_GENERIC);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0, "no request may be issued");
}

#[tokio::test]
async fn test_oversized_body_is_request_error() {
    let port = free_port().await;
    let service = addition_service(port);
    start(&service, port).await;

    // Over the 1 MiB body cap.
    let oversized = "x".repeat((1 << 20) + 1);
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/add"))
        .header("content-type", "application/json")
        .body(oversized)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let err: RpcError = response.json().await.unwrap();
    assert_eq!(err.id, ERR_REQUEST);
}

#[tokio::test]
async fn test_unreachable_target_is_network_error() {
    // Nothing listens on this port.
    let port = free_port().await;
    let service = addition_service(port);

    let err = service
        .send::<_, AddResponse>("add", &AddRequest { a: 1, b: 2 })
        .await
        .unwrap_err();

    assert_eq!(err.id, ERR_NETWORK);
    assert_eq!(err.status, 500);
}

#[tokio::test]
async fn test_registered_error_propagates_verbatim_over_wire() {
    let port = free_port().await;
    let service = loopback_service("calc", port);
    service.register_error(ErrorEntry::new("calc.overflow", 422));
    service.register(Method::new("fail", |_req: AddRequest| async move {
        Err::<AddResponse, _>(RpcError::new("calc.overflow", "value too large", 422))
    }));
    start(&service, port).await;

    let err = service
        .send::<_, AddResponse>("fail", &AddRequest { a: 1, b: 2 })
        .await
        .unwrap_err();

    assert_eq!(err, RpcError::new("calc.overflow", "value too large", 422));
}

#[tokio::test]
async fn test_unknown_error_id_collapses_to_generic_over_wire() {
    let port = free_port().await;
    let service = loopback_service("calc", port);
    service.register(Method::new("fail", |_req: AddRequest| async move {
        Err::<AddResponse, _>(RpcError::new("not.in.catalog", "boom", 418))
    }));
    start(&service, port).await;

    let err = service
        .send::<_, AddResponse>("fail", &AddRequest { a: 1, b: 2 })
        .await
        .unwrap_err();

    assert_eq!(err.id, ERR_GENERIC);
    assert_eq!(err.status, 500);
    assert_eq!(err.text, "boom");
}

#[tokio::test]
async fn test_handler_timeout_maps_to_network_error() {
    let port = free_port().await;
    let mut config = ServiceConfig::new("slowpoke", "0.1.0");
    config.dns_name = "127.0.0.1".to_string();
    config.socket = format!(":{port}");
    config.timeout = Duration::from_millis(200);
    let service = Service::with_config(config);
    service.register(Method::new("slow", |_req: AddRequest| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(AddResponse { result: 0 })
    }));
    start(&service, port).await;

    // Raw client without its own timeout, so the server-side bound decides.
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/slow"))
        .header("content-type", "application/json")
        .body(r#"{"A":1,"B":2}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let err: RpcError = response.json().await.unwrap();
    assert_eq!(err.id, ERR_NETWORK);
}

#[tokio::test]
async fn test_discovery_replacement_returns_latest() {
    let discovery = Discovery::new();
    discovery.register(Service::new("addition", "0.1.0"));
    discovery.register(Service::new("addition", "0.2.0"));

    let retrieved = discovery.retrieve("addition").unwrap();
    assert_eq!(retrieved.config().version, "0.2.0");
}
