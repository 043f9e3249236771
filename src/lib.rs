//! # hive
//!
//! Minimal RPC framework for request/response microservices over HTTP/1.1
//! with JSON payloads.
//!
//! ## Architecture
//!
//! - [`Method`] — a named, typed request/response operation
//! - [`Service`] — a method registry plus network configuration and an
//!   error catalog; exposes `run` (serve) and `send` (call)
//! - [`Discovery`] — a name-keyed registry of services for indirect dispatch
//! - Errors travel the wire as a structured `{id, text, status}` triple
//!
//! Each method is served at `POST /<name>`; every service additionally
//! answers an introspection request at `/` with its own descriptor.
//!
//! ## Example
//!
//! ```ignore
//! use hive::{Method, Service};
//!
//! #[derive(serde::Deserialize)]
//! struct AddRequest { a: i64, b: i64 }
//!
//! #[derive(serde::Serialize)]
//! struct AddResponse { result: i64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hive::HiveError> {
//!     let service = Service::new("addition", "0.1.0");
//!     service.register(Method::new("add", |req: AddRequest| async move {
//!         Ok(AddResponse { result: req.a + req.b })
//!     }));
//!     service.run().await
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod method;
pub mod service;

mod server;

pub use discovery::Discovery;
pub use error::{ErrorCatalog, ErrorEntry, HiveError, RpcError, RpcResult};
pub use error::{ERR_GENERIC, ERR_NETWORK, ERR_REQUEST};
pub use method::Method;
pub use service::{Service, ServiceConfig, ServiceInfo};
