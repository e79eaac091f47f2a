//! Error types for the handler transport.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Per-call protocol failures, answered with an RPC error response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The line was not a JSON-RPC call object.
    #[error("malformed call: {0}")]
    MalformedCall(#[source] serde_json::Error),

    /// The call named a method this handler does not serve.
    #[error("rpc: can't find method {method}")]
    UnknownMethod {
        /// Method name as received.
        method: String,
    },

    /// The call did not carry exactly one parameter.
    #[error("rpc: expected exactly one parameter, got {count}")]
    ParamsArity {
        /// Number of parameters received.
        count: usize,
    },

    /// The parameter was not a request envelope.
    #[error("invalid request envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    /// The line exceeded the size limit and was discarded.
    #[error("call too large: {size} bytes exceeds {max_size} byte limit")]
    CallTooLarge {
        /// Observed line size.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// Reading from or writing to the connection failed.
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failures that end the handler process.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The handler port could not be bound.
    #[error("failed to bind handler listener at {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying bind error.
        #[source]
        source: io::Error,
    },

    /// Accepting the orchestrator connection failed.
    #[error("failed to accept orchestrator connection: {0}")]
    Accept(#[source] io::Error),

    /// The connection failed while serving calls.
    #[error("connection failed: {0}")]
    Connection(#[from] TransportError),
}
