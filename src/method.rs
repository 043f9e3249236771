//! Typed methods and request dispatch.
//!
//! A [`Method`] binds a name to a handler whose concrete request and
//! response types are captured by generics and erased behind the [`Handler`]
//! trait. Every invocation decodes a fresh instance of the declared request
//! type from JSON, runs the handler and encodes the declared response type —
//! the payload is never carried through dispatch as an untyped value.
//!
//! Two handler shapes exist:
//! - context-free: `Fn(Req) -> Future<RpcResult<Resp>>`
//! - context-aware: `Fn(Service, Req) -> Future<RpcResult<Resp>>`, which
//!   receives the owning service handle so it can call out to sibling
//!   services or read service configuration.
//!
//! # Example
//!
//! ```ignore
//! use hive::{Method, RpcResult};
//!
//! #[derive(serde::Deserialize)]
//! struct AddRequest { a: i64, b: i64 }
//!
//! #[derive(serde::Serialize)]
//! struct AddResponse { result: i64 }
//!
//! let add = Method::new("add", |req: AddRequest| async move {
//!     Ok(AddResponse { result: req.a + req.b })
//! });
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RpcResult, ERR_GENERIC, ERR_REQUEST};
use crate::service::Service;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased request handler.
///
/// Implementations decode the declared request type from the raw JSON body,
/// invoke the bound function and encode the response back to JSON. Exactly
/// one of {encoded response, structured error} is produced per invocation.
pub trait Handler: Send + Sync + 'static {
    /// Handle a request with a raw JSON body, producing an encoded response.
    fn call(&self, service: Service, body: Bytes) -> BoxFuture<'static, RpcResult<Vec<u8>>>;
}

/// Wrapper that decodes the payload before calling a context-free handler.
pub struct TypedHandler<F, Req, Resp, Fut>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(Req) -> (Resp, Fut)>,
}

impl<F, Req, Resp, Fut> TypedHandler<F, Req, Resp, Fut>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Req, Resp, Fut> Handler for TypedHandler<F, Req, Resp, Fut>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    fn call(&self, service: Service, body: Bytes) -> BoxFuture<'static, RpcResult<Vec<u8>>> {
        // Decode failure is a request-class fault, derived through the
        // owning service's catalog.
        let request: Req = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                let err = service.throw(ERR_REQUEST, &e);
                return Box::pin(async move { Err(err) });
            }
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            let response = fut.await?;
            serde_json::to_vec(&response).map_err(|e| service.throw(ERR_GENERIC, &e))
        })
    }
}

/// Wrapper for context-aware handlers receiving the owning service.
pub struct ContextualHandler<F, Req, Resp, Fut>
where
    F: Fn(Service, Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(Req) -> (Resp, Fut)>,
}

impl<F, Req, Resp, Fut> ContextualHandler<F, Req, Resp, Fut>
where
    F: Fn(Service, Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    /// Create a new context-aware handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Req, Resp, Fut> Handler for ContextualHandler<F, Req, Resp, Fut>
where
    F: Fn(Service, Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
{
    fn call(&self, service: Service, body: Bytes) -> BoxFuture<'static, RpcResult<Vec<u8>>> {
        let request: Req = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                let err = service.throw(ERR_REQUEST, &e);
                return Box::pin(async move { Err(err) });
            }
        };

        let fut = (self.handler)(service.clone(), request);
        Box::pin(async move {
            let response = fut.await?;
            serde_json::to_vec(&response).map_err(|e| service.throw(ERR_GENERIC, &e))
        })
    }
}

/// A named, typed request/response operation exposed by a service.
///
/// Cheap to clone; the handler is shared behind an `Arc`.
#[derive(Clone)]
pub struct Method {
    name: String,
    handler: Arc<dyn Handler>,
}

impl Method {
    /// Create a method with a context-free handler.
    pub fn new<F, Req, Resp, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(TypedHandler::new(handler)),
        }
    }

    /// Create a method with a context-aware handler.
    pub fn contextual<F, Req, Resp, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Service, Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        Fut: Future<Output = RpcResult<Resp>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(ContextualHandler::new(handler)),
        }
    }

    /// Method name, unique within its service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the bound handler on a raw JSON body.
    pub async fn handle_request(&self, service: Service, body: Bytes) -> RpcResult<Vec<u8>> {
        self.handler.call(service, body).await
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}
