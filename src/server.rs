//! HTTP transport glue: binds each registered method to a POST endpoint.
//!
//! Each request walks one state machine: read body, decode the declared
//! request type, invoke the handler, encode, write. Failures short-circuit
//! to an error response carrying the catalog status and the `{id, text,
//! status}` JSON body:
//!
//! - body read failure → request class
//! - JSON decode failure → request class (inside the typed handler)
//! - handler error → re-derived through the catalog, unknown ids collapse
//!   to generic with the text preserved
//! - response encode failure → generic class (inside the typed handler)
//! - handler timeout → network class

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::{HiveError, RpcError, ERR_GENERIC, ERR_NETWORK, ERR_REQUEST};
use crate::method::Method;
use crate::service::Service;

/// Upper bound on an inbound request body; larger bodies fail as
/// request-class errors.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Serve all registered methods on the service's configured socket.
///
/// The introspection method is registered under the empty name before the
/// route table is built, so it is routable at `/` like any other method.
pub(crate) async fn serve(service: Service) -> Result<(), HiveError> {
    service.register(Method::contextual(
        "",
        |svc: Service, _request: serde_json::Value| async move { Ok(svc.info()) },
    ));

    let mut router = Router::new();
    for method in service.methods_snapshot() {
        let path = format!("/{}", method.name());
        let svc = service.clone();
        router = router.route(
            &path,
            post(move |request: Request| handle_request(svc.clone(), method.clone(), request)),
        );
    }
    tracing::info!(service = %service.config().name, "all methods activated");

    let addr = bind_addr(&service.config().socket);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

/// Drive a single request through the handling state machine.
async fn handle_request(service: Service, method: Method, request: Request) -> Response {
    tracing::debug!(method = %method.name(), "got request");

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return error_response(&service.throw(ERR_REQUEST, &e)),
    };

    // Handler execution is bounded by the configured timeout; an outbound
    // call issued from within the handler carries its own, independent one.
    let timeout = service.config().timeout;
    let result = tokio::time::timeout(timeout, method.handle_request(service.clone(), body)).await;

    match result {
        Ok(Ok(encoded)) => json_response(StatusCode::OK, encoded),
        Ok(Err(e)) => error_response(&service.sthrow(&e.id, &e.text)),
        Err(_) => error_response(&service.sthrow(ERR_NETWORK, "handler timed out")),
    }
}

/// Encode a structured error response with its catalog status.
fn error_response(err: &RpcError) -> Response {
    let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    // The triple is plain strings so encoding cannot realistically fail,
    // but the body must never end up truncated or empty.
    let body = serde_json::to_vec(err).unwrap_or_else(|_| {
        format!(r#"{{"id":"{ERR_GENERIC}","text":"failed to encode error","status":500}}"#)
            .into_bytes()
    });
    json_response(status, body)
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Bind address for a socket string; `":80"` binds all interfaces.
fn bind_addr(socket: &str) -> String {
    match socket.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => socket.to_string(),
    }
}
