//! Verb routing from a request envelope to a handler method.
//!
//! [`dispatch`] guarantees one reply per request: handler errors become
//! failure replies and a panicking handler is reported rather than taking
//! the connection down.

use std::panic::{self, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use strum::{Display, EnumString};
use tracing::{debug, error};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::protocol::{ID_PARAM, ReplyEnvelope, RequestEnvelope};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Verbs a handler may serve. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    /// Read records.
    Get,
    /// Create records.
    Post,
    /// Update a record.
    Put,
    /// Remove a record.
    Delete,
}

/// A store-backed handler serving some or all verbs.
///
/// Methods left at their defaults reply that the verb is not supported.
pub trait RequestHandler {
    /// Serves `GET`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to be sent back as a failure reply.
    fn get(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let _ = (context, request);
        Err(HandlerError::unsupported_verb(Verb::Get.to_string()))
    }

    /// Serves `POST`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to be sent back as a failure reply.
    fn post(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let _ = (context, request);
        Err(HandlerError::unsupported_verb(Verb::Post.to_string()))
    }

    /// Serves `PUT`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to be sent back as a failure reply.
    fn put(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let _ = (context, request);
        Err(HandlerError::unsupported_verb(Verb::Put.to_string()))
    }

    /// Serves `DELETE`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to be sent back as a failure reply.
    fn delete(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let _ = (context, request);
        Err(HandlerError::unsupported_verb(Verb::Delete.to_string()))
    }
}

/// Routes `request` to the handler method for its verb and returns the
/// single reply for it.
#[must_use]
pub fn dispatch<H>(
    handler: &H,
    context: &mut HandlerContext,
    request: &RequestEnvelope,
) -> ReplyEnvelope
where
    H: RequestHandler + ?Sized,
{
    let raw = request.query_type();
    if raw.is_empty() {
        debug!(target: DISPATCH_TARGET, "request without verb");
        return HandlerError::VerbNotSet.into_reply();
    }
    let Ok(verb) = raw.parse::<Verb>() else {
        debug!(target: DISPATCH_TARGET, verb = raw, "unknown verb");
        return HandlerError::unsupported_verb(raw).into_reply();
    };

    debug!(target: DISPATCH_TARGET, %verb, "dispatching request");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match verb {
        Verb::Get => handler.get(context, request),
        Verb::Post => handler.post(context, request),
        Verb::Put => handler.put(context, request),
        Verb::Delete => handler.delete(context, request),
    }));

    match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(failure)) => {
            debug!(target: DISPATCH_TARGET, %verb, error = %failure, "request failed");
            failure.into_reply()
        }
        Err(_) => {
            error!(target: DISPATCH_TARGET, %verb, "handler panicked");
            ReplyEnvelope::failure(format!("Internal error: {verb} handler panicked"))
        }
    }
}

/// Decodes the request body as JSON.
///
/// # Errors
///
/// Returns [`HandlerError::Decode`] quoting the raw body.
pub fn decode_body<T: DeserializeOwned>(request: &RequestEnvelope) -> HandlerResult<T> {
    serde_json::from_slice(request.post_data())
        .map_err(|source| HandlerError::decode(request.post_data(), source))
}

/// Parses the `id` path parameter.
///
/// # Errors
///
/// Returns a [`HandlerError::NotFound`] for `kind` when the parameter is
/// absent or not an integer, since no record can carry such an id.
pub fn record_id(request: &RequestEnvelope, kind: &'static str) -> HandlerResult<i64> {
    let raw = request.path_param(ID_PARAM).unwrap_or_default();
    raw.parse().map_err(|_| HandlerError::not_found(kind, raw))
}
