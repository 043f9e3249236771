//! Service handle: configuration, method registry, error catalog and the
//! client-side call path.
//!
//! A [`Service`] is a cheap-clone shared handle. Configuration (name,
//! version, network address, timeout) is fixed at construction; the method
//! registry and error catalog are mutable through [`Service::register`] and
//! [`Service::register_error`] and must be fully populated before
//! [`Service::run`] is called — the framework applies no synchronization to
//! lookups once serving has begun.
//!
//! # Example
//!
//! ```ignore
//! use hive::{Method, Service};
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct AddRequest { #[serde(rename = "A")] a: i64, #[serde(rename = "B")] b: i64 }
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct AddResponse { #[serde(rename = "Result")] result: i64 }
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

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{
    ErrorCatalog, ErrorEntry, HiveError, RpcError, RpcResult, ERR_GENERIC, ERR_NETWORK,
};
use crate::method::Method;
use crate::server;

const JSON_MIME: &str = "application/json";

/// Network and identity configuration, fixed at service construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name; doubles as the default DNS name.
    pub name: String,
    /// Service version string.
    pub version: String,
    /// Wire protocol scheme.
    pub protocol: String,
    /// Host name used when calling this service.
    pub dns_name: String,
    /// Listening socket in `host:port` or `:port` form.
    pub socket: String,
    /// Per-call timeout, applied to both serving and outbound calls.
    pub timeout: Duration,
    /// When set, calls invoke the handler in-process and skip the network.
    pub forward_local: bool,
}

impl ServiceConfig {
    /// Seed defaults: protocol `http`, DNS name equal to the service name,
    /// socket `:80`, timeout 10 seconds, local forwarding off.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dns_name: name.clone(),
            name,
            version: version.into(),
            protocol: "http".to_string(),
            socket: ":80".to_string(),
            timeout: Duration::from_secs(10),
            forward_local: false,
        }
    }
}

/// Introspection descriptor returned by the auto-registered empty-named
/// method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Wire protocol scheme.
    pub protocol: String,
    /// Host name of the service.
    pub dnsname: String,
    /// Listening socket.
    pub socket: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Whether local forwarding is enabled.
    pub forward_local: bool,
    /// Registered method names, sorted.
    pub methods: Vec<String>,
}

struct ServiceInner {
    config: ServiceConfig,
    methods: RwLock<HashMap<String, Method>>,
    catalog: RwLock<ErrorCatalog>,
    context: RwLock<HashMap<String, serde_json::Value>>,
    // Built on first outbound call and reused so all calls share one
    // connection pool.
    http: OnceLock<reqwest::Client>,
}

/// A named, network-addressable collection of methods plus configuration and
/// an error catalog.
///
/// Clones share the same registry and catalog.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    /// Create a service with default network configuration.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_config(ServiceConfig::new(name, version))
    }

    /// Create a service from an explicit configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                config,
                methods: RwLock::new(HashMap::new()),
                catalog: RwLock::new(ErrorCatalog::new()),
                context: RwLock::new(HashMap::new()),
                http: OnceLock::new(),
            }),
        }
    }

    /// The fixed configuration this service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Register a method, replacing any prior method with the same name.
    pub fn register(&self, method: Method) {
        write_lock(&self.inner.methods).insert(method.name().to_string(), method);
    }

    /// Register an error entry, replacing any prior entry with the same id.
    pub fn register_error(&self, entry: ErrorEntry) {
        write_lock(&self.inner.catalog).register(entry);
    }

    /// Look up a registered method by name.
    pub fn method(&self, name: &str) -> Option<Method> {
        read_lock(&self.inner.methods).get(name).cloned()
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read_lock(&self.inner.methods).keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn methods_snapshot(&self) -> Vec<Method> {
        read_lock(&self.inner.methods).values().cloned().collect()
    }

    /// Store a free-form context value readable by context-aware handlers.
    ///
    /// Like the registries, the context map must be populated before `run`.
    pub fn set_context(&self, key: impl Into<String>, value: serde_json::Value) {
        write_lock(&self.inner.context).insert(key.into(), value);
    }

    /// Read a context value by key.
    pub fn context(&self, key: &str) -> Option<serde_json::Value> {
        read_lock(&self.inner.context).get(key).cloned()
    }

    /// Build a structured error for `id`, taking the text from `cause`.
    ///
    /// Unknown ids collapse to the generic class; the catalog entry only
    /// contributes the status code.
    pub fn throw(&self, id: &str, cause: &dyn std::error::Error) -> RpcError {
        self.sthrow(id, &cause.to_string())
    }

    /// Build a structured error for `id` with a literal text.
    pub fn sthrow(&self, id: &str, text: &str) -> RpcError {
        read_lock(&self.inner.catalog).instance(id, text)
    }

    /// The introspection descriptor for this service.
    pub fn info(&self) -> ServiceInfo {
        let config = self.config();
        ServiceInfo {
            name: config.name.clone(),
            version: config.version.clone(),
            protocol: config.protocol.clone(),
            dnsname: config.dns_name.clone(),
            socket: config.socket.clone(),
            timeout_ms: u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            forward_local: config.forward_local,
            methods: self.method_names(),
        }
    }

    /// Call a method on this service.
    ///
    /// Resolves the method name, then either invokes the handler in-process
    /// (local forwarding) or marshals the request and POSTs it to
    /// `protocol://dnsname:port/method`, bounded by the configured timeout.
    /// One failed attempt is terminal; retrying is the caller's decision.
    ///
    /// Remote structured errors are propagated verbatim; local faults map to
    /// the generic or network class.
    ///
    /// Local forwarding skips the socket but still passes the request
    /// through the JSON codec, so types that do not round-trip losslessly
    /// behave the same locally as remotely.
    pub async fn send<Req, Resp>(&self, name: &str, request: &Req) -> RpcResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // Resolve before branching on forwarding so an unknown name fails
        // the same way on both paths.
        let method = match self.method(name) {
            Some(m) => m,
            None => return Err(self.sthrow(ERR_GENERIC, &format!("method {name} not found"))),
        };

        let body = serde_json::to_vec(request).map_err(|e| self.throw(ERR_GENERIC, &e))?;

        if self.config().forward_local {
            let encoded = method.handle_request(self.clone(), body.into()).await?;
            return serde_json::from_slice(&encoded).map_err(|e| self.throw(ERR_GENERIC, &e));
        }

        let url = self.method_url(name);
        tracing::debug!(%url, "querying service");

        let response = self
            .http_client()?
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, JSON_MIME)
            .body(body)
            .send()
            .await
            .map_err(|e| self.throw(ERR_NETWORK, &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.throw(ERR_NETWORK, &e))?;

        if !status.is_success() {
            let remote: RpcError =
                serde_json::from_slice(&bytes).map_err(|e| self.throw(ERR_GENERIC, &e))?;
            return Err(remote);
        }

        serde_json::from_slice(&bytes).map_err(|e| self.throw(ERR_GENERIC, &e))
    }

    /// Serve the registered methods on the configured socket.
    ///
    /// Registers the introspection method under the empty name, binds the
    /// listener and serves each inbound request on its own task. Runs until
    /// the server fails.
    pub async fn run(&self) -> Result<(), HiveError> {
        server::serve(self.clone()).await
    }

    /// Shared HTTP client, built on first use with the configured timeout.
    fn http_client(&self) -> RpcResult<&reqwest::Client> {
        if let Some(client) = self.inner.http.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder()
            .timeout(self.config().timeout)
            .build()
            .map_err(|e| self.throw(ERR_GENERIC, &e))?;
        // A concurrent first call may have won the race; keep whichever
        // client landed in the cell.
        Ok(self.inner.http.get_or_init(|| client))
    }

    fn method_url(&self, name: &str) -> String {
        let config = self.config();
        format!(
            "{}://{}:{}/{}",
            config.protocol,
            config.dns_name,
            socket_port(&config.socket),
            name
        )
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.config().name)
            .field("version", &self.config().version)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Trailing port component of a socket string (`":80"` → `"80"`,
/// `"0.0.0.0:8080"` → `"8080"`).
pub(crate) fn socket_port(socket: &str) -> &str {
    match socket.rfind(':') {
        Some(i) => &socket[i + 1..],
        None => socket,
    }
}

// Lock poisoning only occurs after a panic in another holder; recover with
// the inner value rather than cascading the panic.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
