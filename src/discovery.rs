//! Name-keyed registry of services for indirect dispatch.
//!
//! A handler that needs to call another service looks it up here by name
//! instead of hardcoding a target. The registry holds plain service handles
//! and owns none of their lifecycle; last registration under a name wins.
//!
//! # Example
//!
//! ```ignore
//! use hive::{Discovery, Service};
//!
//! let discovery = Discovery::new();
//! discovery.register(addition_service);
//!
//! let response: AddResponse = discovery
//!     .send("addition", "add", &AddRequest { a: 2, b: 3 })
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RpcError, RpcResult};
use crate::service::Service;

/// Registry mapping service names to service handles.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct Discovery {
    services: Arc<RwLock<HashMap<String, Service>>>,
}

impl Discovery {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its configured name, replacing any prior
    /// registration.
    pub fn register(&self, service: Service) {
        let name = service.config().name.clone();
        self.services
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, service);
    }

    /// Look up a service by name.
    ///
    /// Returns `None` when the name is not registered; callers must check
    /// before dispatching.
    pub fn retrieve(&self, name: &str) -> Option<Service> {
        self.services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Call `method` on the service registered under `service`.
    ///
    /// An unregistered service name yields a structured generic-class error;
    /// any error produced by the target propagates unchanged.
    pub async fn send<Req, Resp>(&self, service: &str, method: &str, request: &Req) -> RpcResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let target = self
            .retrieve(service)
            .ok_or_else(|| RpcError::generic(format!("service {service} not registered")))?;
        target.send(method, request).await
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        f.debug_struct("Discovery").field("services", &names).finish()
    }
}
