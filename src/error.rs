//! Structured error model and the per-service error catalog.
//!
//! An RPC failure travels the wire as a `{id, text, status}` triple: a
//! stable, machine-readable error class (`id` plus its HTTP `status`) and an
//! unstable human-readable detail (`text`). The catalog maps known ids to
//! their default status codes; throwing an unknown id collapses to the
//! generic class so that a malformed failure can never escape the taxonomy.
//!
//! # Example
//!
//! ```
//! use hive::error::{ErrorCatalog, ErrorEntry, ERR_REQUEST};
//!
//! let mut catalog = ErrorCatalog::new();
//! catalog.register(ErrorEntry::new("calc.divide_by_zero", 422));
//!
//! let err = catalog.instance("calc.divide_by_zero", "division by zero");
//! assert_eq!(err.status, 422);
//!
//! let err = catalog.instance("calc.unknown", "mystery");
//! assert_eq!(err.id, hive::error::ERR_GENERIC);
//!
//! let err = catalog.instance(ERR_REQUEST, "bad payload");
//! assert_eq!(err.status, 400);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic, internal fault.
pub const ERR_GENERIC: &str = "hive.internal.generic";
/// Transport-level fault (refused connection, timeout, unreadable body).
pub const ERR_NETWORK: &str = "hive.internal.network";
/// Malformed inbound request (unreadable or undecodable body).
pub const ERR_REQUEST: &str = "hive.internal.request";

const STATUS_INTERNAL: u16 = 500;
const STATUS_BAD_REQUEST: u16 = 400;

/// Result alias for handler and call outcomes.
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Wire-serializable error triple.
///
/// `id` and `status` identify the failure class for programmatic handling;
/// `text` carries the originating cause's message only — never a default
/// text, never a stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{id} [{status}]: {text}")]
pub struct RpcError {
    /// Error class identifier, e.g. `hive.internal.request`.
    pub id: String,
    /// Human-readable detail taken from the immediate cause.
    pub text: String,
    /// HTTP status code associated with the class.
    pub status: u16,
}

impl RpcError {
    /// Build an error with an explicit id, text and status.
    pub fn new(id: impl Into<String>, text: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            status,
        }
    }

    /// Generic-class error with the canonical internal status.
    pub fn generic(text: impl Into<String>) -> Self {
        Self::new(ERR_GENERIC, text, STATUS_INTERNAL)
    }

    /// Network-class error with the canonical internal status.
    pub fn network(text: impl Into<String>) -> Self {
        Self::new(ERR_NETWORK, text, STATUS_INTERNAL)
    }

    /// Request-class error with the canonical bad-request status.
    pub fn request(text: impl Into<String>) -> Self {
        Self::new(ERR_REQUEST, text, STATUS_BAD_REQUEST)
    }
}

/// Catalog entry: an error id and the defaults applied when it is thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// Error class identifier.
    pub id: String,
    /// Default HTTP status code for the class.
    pub status: u16,
    /// Optional default text; informational only, thrown errors always take
    /// their text from the cause.
    pub text: String,
}

impl ErrorEntry {
    /// Create an entry with no default text.
    pub fn new(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            text: String::new(),
        }
    }
}

/// Maps error ids to their default status codes.
///
/// Seeded with the three reserved ids; registering an id that already exists
/// overwrites the prior entry.
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    entries: HashMap<String, ErrorEntry>,
}

impl ErrorCatalog {
    /// Create a catalog seeded with the reserved ids.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for (id, status) in [
            (ERR_GENERIC, STATUS_INTERNAL),
            (ERR_NETWORK, STATUS_INTERNAL),
            (ERR_REQUEST, STATUS_BAD_REQUEST),
        ] {
            entries.insert(id.to_string(), ErrorEntry::new(id, status));
        }
        Self { entries }
    }

    /// Insert or replace an entry, keyed by its id.
    pub fn register(&mut self, entry: ErrorEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&ErrorEntry> {
        self.entries.get(id)
    }

    /// Build an [`RpcError`] for `id` carrying `text`.
    ///
    /// Unknown ids substitute the generic entry; the entry's status is
    /// copied, the text always comes from the caller.
    pub fn instance(&self, id: &str, text: &str) -> RpcError {
        match self
            .entries
            .get(id)
            .or_else(|| self.entries.get(ERR_GENERIC))
        {
            Some(entry) => RpcError::new(&entry.id, text, entry.status),
            // Unreachable while the generic seed is present; kept so the
            // catalog can never fail to produce an error.
            None => RpcError::generic(text),
        }
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Infrastructure error for serving and composition roots.
#[derive(Debug, Error)]
pub enum HiveError {
    /// I/O error while binding or serving the listening socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A structured RPC error surfaced outside a handler.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
