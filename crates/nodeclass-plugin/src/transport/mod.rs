//! Single-connection JSON-RPC transport between orchestrator and handler.
//!
//! A handler binds its port, accepts exactly one connection and answers
//! newline-delimited calls on it in order until the peer closes. Protocol
//! mistakes in one call produce an error response and serving continues;
//! only a broken stream ends the connection.

#[cfg(any(test, feature = "test-support"))]
mod client;
mod errors;
mod framing;
#[cfg(any(test, feature = "test-support"))]
mod process;
mod rpc;
mod server;

#[cfg(any(test, feature = "test-support"))]
pub use client::RpcClient;
pub use errors::{ServeError, TransportError};
pub use framing::MAX_LINE_BYTES;
#[cfg(any(test, feature = "test-support"))]
pub use process::HandlerProcess;
pub use rpc::{HANDLE_REQUEST_METHOD, RpcCall, RpcResponse};
pub use server::{Server, serve_connection};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
