//! JSON-RPC 1.0 call and response objects.
//!
//! A call names the single exported method and carries the request envelope
//! as its only positional parameter; the response echoes the call id and
//! holds either the reply or a transport error string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::TransportError;
use crate::protocol::{ReplyEnvelope, RequestEnvelope};

/// The only method a handler exports.
pub const HANDLE_REQUEST_METHOD: &str = "Plugin.HandleRequest";

/// A remote call as sent by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcCall {
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

impl RpcCall {
    /// Builds a `Plugin.HandleRequest` call for `request`.
    ///
    /// # Errors
    ///
    /// Returns the encoding error if the envelope cannot be represented as
    /// JSON.
    pub fn handle_request(id: u64, request: &RequestEnvelope) -> serde_json::Result<Self> {
        Ok(Self {
            method: HANDLE_REQUEST_METHOD.to_owned(),
            params: Value::Array(vec![serde_json::to_value(request)?]),
            id: Value::from(id),
        })
    }

    /// Parses one call line.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MalformedCall`] when the line is not a call
    /// object.
    pub fn parse(line: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(line).map_err(TransportError::MalformedCall)
    }

    /// Returns the call id.
    #[must_use]
    pub const fn id(&self) -> &Value {
        &self.id
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Checks the method and arity and decodes the request envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownMethod`],
    /// [`TransportError::ParamsArity`] or
    /// [`TransportError::InvalidEnvelope`].
    pub fn into_request(self) -> Result<RequestEnvelope, TransportError> {
        if self.method != HANDLE_REQUEST_METHOD {
            return Err(TransportError::UnknownMethod {
                method: self.method,
            });
        }
        let mut params = match self.params {
            Value::Array(params) => params,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        if params.len() != 1 {
            return Err(TransportError::ParamsArity {
                count: params.len(),
            });
        }
        serde_json::from_value(params.remove(0)).map_err(TransportError::InvalidEnvelope)
    }
}

/// The response written for every call line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    id: Value,
    result: Option<ReplyEnvelope>,
    error: Option<String>,
}

impl RpcResponse {
    /// Wraps a handler reply.
    #[must_use]
    pub const fn reply(id: Value, reply: ReplyEnvelope) -> Self {
        Self {
            id,
            result: Some(reply),
            error: None,
        }
    }

    /// Reports a transport-level failure.
    #[must_use]
    pub fn error(id: Value, error: &TransportError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// Returns the echoed call id.
    #[must_use]
    pub const fn id(&self) -> &Value {
        &self.id
    }

    /// Returns the handler reply, if the call reached the handler.
    #[must_use]
    pub const fn result(&self) -> Option<&ReplyEnvelope> {
        self.result.as_ref()
    }

    /// Returns the transport error text, if any.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
