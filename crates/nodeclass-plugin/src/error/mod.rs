//! Request-level errors and their conversion into failure replies.
//!
//! Nothing in this module ends the process. Every [`HandlerError`] becomes a
//! [`ReplyEnvelope`] whose message is the error's display text, except
//! [`HandlerError::Denied`], which carries the authorization collaborator's
//! own reply and is forwarded unchanged.

use thiserror::Error;

use crate::protocol::ReplyEnvelope;
use crate::store::StoreError;

/// Failures that end a single request with a failure reply.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The envelope carried an empty verb.
    #[error("Internal error: HTTP request type was not set")]
    VerbNotSet,

    /// The verb is unknown or not served by this handler.
    #[error("Internal error: Invalid HTTP request type for this plugin {verb}")]
    UnsupportedVerb {
        /// Verb as received.
        verb: String,
    },

    /// No `env_id` query parameter.
    #[error("'env_id' must be set")]
    MissingEnvId,

    /// Authorization failed; the collaborator's reply is returned verbatim.
    #[error("{}", .0.message())]
    Denied(ReplyEnvelope),

    /// No `PluginDatabasePath` path parameter.
    #[error("Internal Error: 'PluginDatabasePath' must be set")]
    MissingStorePath,

    /// The store file could not be opened or migrated.
    #[error("Store open error for '{file}'. {source}")]
    StoreOpen {
        /// Full store file path.
        file: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// The request body was not valid JSON for the expected shape.
    #[error("Error decoding the POST data ({body}). Error decoding JSON ('{source}').")]
    Decode {
        /// Body as text, lossily decoded.
        body: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A record addressed by id does not exist within the caller's scope.
    #[error("{kind} Id:{id} not found")]
    NotFound {
        /// Record kind, for example `Regex`.
        kind: &'static str,
        /// Identifier as supplied by the caller.
        id: String,
    },

    /// A read failed; the raw store text is reported.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A write failed.
    #[error("Update error: {0}")]
    Update(#[source] StoreError),
}

impl HandlerError {
    /// Creates an unsupported verb error.
    #[must_use]
    pub fn unsupported_verb(verb: impl Into<String>) -> Self {
        Self::UnsupportedVerb { verb: verb.into() }
    }

    /// Creates a body decode error, keeping the raw body in the message.
    #[must_use]
    pub fn decode(body: &[u8], source: serde_json::Error) -> Self {
        Self::Decode {
            body: String::from_utf8_lossy(body).into_owned(),
            source,
        }
    }

    /// Creates a not-found error for a record kind and caller-supplied id.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Converts the error into the reply sent back to the orchestrator.
    #[must_use]
    pub fn into_reply(self) -> ReplyEnvelope {
        match self {
            Self::Denied(reply) => reply,
            other => ReplyEnvelope::failure(other.to_string()),
        }
    }
}

impl From<HandlerError> for ReplyEnvelope {
    fn from(error: HandlerError) -> Self {
        error.into_reply()
    }
}

/// Result alias for handler operations.
pub type HandlerResult<T = ReplyEnvelope> = Result<T, HandlerError>;

#[cfg(test)]
mod tests;
