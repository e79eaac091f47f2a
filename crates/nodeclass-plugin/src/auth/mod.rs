//! Environment resolution and access control.
//!
//! Handlers never decide on their own whether a caller may touch an
//! environment. They hand the request and the requested `env_id` to an
//! [`EnvironmentResolver`] and either receive the [`Environment`] that scopes
//! every store access, or a failure reply to send back unchanged.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::{LOGIN_PARAM, ReplyEnvelope, RequestEnvelope};
use crate::store::Scope;

const AUTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auth");

/// An environment the caller is allowed to work in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Orchestrator identifier, as used in the `env_id` query parameter.
    pub id: i64,
    /// Data centre system name.
    pub dc_sys_name: String,
    /// Environment system name.
    pub sys_name: String,
}

impl Environment {
    /// Creates an environment descriptor.
    #[must_use]
    pub fn new(id: i64, dc_sys_name: impl Into<String>, sys_name: impl Into<String>) -> Self {
        Self {
            id,
            dc_sys_name: dc_sys_name.into(),
            sys_name: sys_name.into(),
        }
    }

    /// Returns the store scope owned by this environment.
    #[must_use]
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(&self.dc_sys_name, &self.sys_name)
    }
}

/// Resolves an environment identifier and checks the caller may use it.
pub trait EnvironmentResolver {
    /// Returns the environment for `env_id`, or the failure reply to send.
    ///
    /// # Errors
    ///
    /// Returns a failure [`ReplyEnvelope`] when the environment is unknown or
    /// the caller is not allowed to access it.
    fn resolve(
        &self,
        request: &RequestEnvelope,
        env_id: &str,
    ) -> Result<Environment, ReplyEnvelope>;
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    environment: Environment,
    #[serde(default)]
    logins: Option<Vec<String>>,
}

/// Resolver backed by a JSON catalogue file.
///
/// The file holds an array of entries such as
/// `{"id": 3, "dc_sys_name": "dc1", "sys_name": "prod", "logins": ["alice"]}`.
/// When `logins` is present, the request's `login` path parameter must be
/// listed. The file is re-read on every call.
#[derive(Debug, Clone, Default)]
pub struct CatalogResolver {
    path: Option<Utf8PathBuf>,
}

impl CatalogResolver {
    /// Creates a resolver; `None` rejects every request.
    #[must_use]
    pub fn new(path: Option<&Utf8Path>) -> Self {
        Self {
            path: path.map(Utf8Path::to_path_buf),
        }
    }

    fn load(&self) -> Result<Vec<CatalogEntry>, ReplyEnvelope> {
        let Some(path) = self.path.as_deref() else {
            warn!(target: AUTH_TARGET, "no environment catalog configured");
            return Err(ReplyEnvelope::failure("Environment catalog is not configured"));
        };
        let contents = fs::read_to_string(path).map_err(|error| unreadable(path, &error))?;
        serde_json::from_str(&contents).map_err(|error| unreadable(path, &error))
    }
}

impl EnvironmentResolver for CatalogResolver {
    fn resolve(
        &self,
        request: &RequestEnvelope,
        env_id: &str,
    ) -> Result<Environment, ReplyEnvelope> {
        let entry = self
            .load()?
            .into_iter()
            .find(|entry| entry.environment.id.to_string() == env_id)
            .ok_or_else(|| ReplyEnvelope::failure(format!("Environment '{env_id}' not found")))?;

        if let Some(logins) = &entry.logins {
            let login = request.path_param(LOGIN_PARAM).unwrap_or_default();
            if !logins.iter().any(|allowed| allowed == login) {
                debug!(target: AUTH_TARGET, env_id, login, "environment access denied");
                return Err(ReplyEnvelope::failure(format!(
                    "User '{login}' is not allowed to access environment '{env_id}'"
                )));
            }
        }
        Ok(entry.environment)
    }
}

fn unreadable(path: &Utf8Path, error: &dyn std::fmt::Display) -> ReplyEnvelope {
    warn!(target: AUTH_TARGET, path = %path, error = %error, "environment catalog unreadable");
    ReplyEnvelope::failure(format!("Unable to read environment catalog: {error}"))
}
