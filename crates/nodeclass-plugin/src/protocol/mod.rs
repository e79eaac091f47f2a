//! Envelope types exchanged between the orchestrator and a handler.
//!
//! Each remote call carries one [`RequestEnvelope`] describing an HTTP-style
//! request the orchestrator received, and yields exactly one
//! [`ReplyEnvelope`]. Field names on the wire are `PascalCase` so the
//! envelopes stay interchangeable with the orchestrator's own encoding.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Path parameter naming the directory prefix of the handler's private store.
pub const STORE_PATH_PARAM: &str = "PluginDatabasePath";

/// Path parameter carrying the record identifier for per-record operations.
pub const ID_PARAM: &str = "id";

/// Path parameter carrying the caller's login name.
pub const LOGIN_PARAM: &str = "login";

/// Query parameter identifying the target environment.
pub const ENV_ID_PARAM: &str = "env_id";

/// Query parameter filtering regex mappings by their parent regex.
pub const REGEX_ID_PARAM: &str = "regex_id";

/// Query parameter filtering node classifications by salt id.
pub const SALT_ID_PARAM: &str = "salt_id";

/// An HTTP-style request forwarded by the orchestrator.
///
/// Immutable once received: the accessors only borrow.
///
/// # Example
///
/// ```
/// use nodeclass_plugin::protocol::RequestEnvelope;
///
/// let request = RequestEnvelope::new("GET")
///     .with_query("env_id", "3")
///     .with_path_param("PluginDatabasePath", "/var/lib/nodeclass/");
/// assert_eq!(request.query_type(), "GET");
/// assert_eq!(request.query_first("env_id"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEnvelope {
    #[serde(rename = "QueryType", default, deserialize_with = "null_as_default")]
    query_type: String,
    #[serde(rename = "QueryString", default, deserialize_with = "null_as_default")]
    query_string: HashMap<String, Vec<String>>,
    #[serde(rename = "PathParams", default, deserialize_with = "null_as_default")]
    path_params: HashMap<String, String>,
    #[serde(rename = "PostData", default, with = "post_data")]
    post_data: Vec<u8>,
}

impl RequestEnvelope {
    /// Creates an envelope for the given verb with no parameters or body.
    #[must_use]
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            query_type: query_type.into(),
            ..Self::default()
        }
    }

    /// Appends a value to a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets a path parameter.
    #[must_use]
    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    /// Sets the raw request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.post_data = body.into();
        self
    }

    /// Returns the verb exactly as received.
    #[must_use]
    pub const fn query_type(&self) -> &str {
        self.query_type.as_str()
    }

    /// Returns every value supplied for a query parameter, in order.
    #[must_use]
    pub fn query_values(&self, key: &str) -> &[String] {
        self.query_string
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_first(&self, key: &str) -> Option<&str> {
        self.query_values(key).first().map(String::as_str)
    }

    /// Returns a path parameter when present and non-empty.
    #[must_use]
    pub fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn post_data(&self) -> &[u8] {
        &self.post_data
    }
}

/// Outcome flag carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// The request was served; `Text` holds the payload.
    Success,
    /// The request failed; `Message` explains why.
    Failure,
}

/// The single reply produced for each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyEnvelope {
    #[serde(rename = "PluginReturn")]
    code: i64,
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "Status")]
    status: ReplyStatus,
    #[serde(rename = "Message")]
    message: String,
}

impl ReplyEnvelope {
    /// Creates a successful reply carrying an already-encoded payload.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            code: 0,
            text: text.into(),
            status: ReplyStatus::Success,
            message: String::new(),
        }
    }

    /// Encodes `payload` as JSON and wraps it in a successful reply.
    ///
    /// Encoding failures become a failure reply rather than an error, so the
    /// caller always has something to send back.
    #[must_use]
    pub fn success_json<T: Serialize + ?Sized>(payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(text) => Self::success(text),
            Err(error) => Self::failure(format!("Marshal error: {error}")),
        }
    }

    /// Creates a failed reply with an empty payload.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            text: String::new(),
            status: ReplyStatus::Failure,
            message: message.into(),
        }
    }

    /// Returns the reserved numeric code (always zero).
    #[must_use]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Returns the payload text.
    #[must_use]
    pub const fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Returns the status flag.
    #[must_use]
    pub const fn status(&self) -> ReplyStatus {
        self.status
    }

    /// Returns the human-readable message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns true when the status is [`ReplyStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Raw bytes travel as a base64 string; `null` decodes to an empty body.
mod post_data {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
