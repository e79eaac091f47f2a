//! Per-process handler state and the common request preamble.

use camino::Utf8PathBuf;
use nodeclass_config::HandlerConfig;
use tracing::debug;

use crate::auth::{Environment, EnvironmentResolver};
use crate::dispatch::DISPATCH_TARGET;
use crate::error::{HandlerError, HandlerResult};
use crate::lock::PortLock;
use crate::protocol::{ENV_ID_PARAM, RequestEnvelope, STORE_PATH_PARAM};
use crate::store::Store;

/// State owned by a handler process for its whole life.
///
/// Created once at start-up and passed by mutable reference to every
/// request. The store path is not kept here: it arrives with each request.
pub struct HandlerContext {
    lock: PortLock,
    store_file: String,
    resolver: Box<dyn EnvironmentResolver + Send>,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("lock", &self.lock)
            .field("store_file", &self.store_file)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    /// Assembles a context from its parts.
    #[must_use]
    pub fn new(
        lock: PortLock,
        store_file: impl Into<String>,
        resolver: Box<dyn EnvironmentResolver + Send>,
    ) -> Self {
        Self {
            lock,
            store_file: store_file.into(),
            resolver,
        }
    }

    /// Builds a context whose lock and store file follow `config`.
    #[must_use]
    pub fn from_config(
        config: &HandlerConfig,
        resolver: Box<dyn EnvironmentResolver + Send>,
    ) -> Self {
        Self::new(
            PortLock::new(config.lock_address()),
            config.store_file(),
            resolver,
        )
    }

    /// Returns the cross-process lock.
    #[must_use]
    pub const fn lock(&self) -> &PortLock {
        &self.lock
    }

    /// Returns the store file for `request`: its `PluginDatabasePath`
    /// followed directly by the configured file name.
    ///
    /// The path parameter is used as a plain string prefix, so it normally
    /// ends with a separator.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::MissingStorePath`] when the parameter is absent
    /// or empty.
    pub fn store_path(&self, request: &RequestEnvelope) -> HandlerResult<Utf8PathBuf> {
        let prefix = request
            .path_param(STORE_PATH_PARAM)
            .filter(|prefix| !prefix.is_empty())
            .ok_or(HandlerError::MissingStorePath)?;
        Ok(Utf8PathBuf::from(format!("{prefix}{}", self.store_file)))
    }
}

/// The outcome of the steps every handler runs before touching its store.
#[derive(Debug)]
pub struct Preamble<'ctx> {
    /// Environment the caller was authorised for.
    pub environment: Environment,
    /// Open store, guarded by the context's lock.
    pub store: Store<'ctx>,
}

impl<'ctx> Preamble<'ctx> {
    /// Validates `env_id`, authorises the caller, then opens the store.
    ///
    /// Steps stop at the first failure, so a request without `env_id` never
    /// reaches the resolver or the store.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::MissingEnvId`], [`HandlerError::Denied`],
    /// [`HandlerError::MissingStorePath`] or [`HandlerError::StoreOpen`].
    pub fn run(context: &'ctx mut HandlerContext, request: &RequestEnvelope) -> HandlerResult<Self> {
        let env_id = request
            .query_first(ENV_ID_PARAM)
            .ok_or(HandlerError::MissingEnvId)?;
        let environment = context
            .resolver
            .resolve(request, env_id)
            .map_err(HandlerError::Denied)?;
        let path = context.store_path(request)?;
        debug!(
            target: DISPATCH_TARGET,
            env_id,
            dc = %environment.dc_sys_name,
            env = %environment.sys_name,
            store = %path,
            "preamble passed"
        );
        let store = Store::open(&path, &mut context.lock).map_err(|source| {
            HandlerError::StoreOpen {
                file: path.to_string(),
                source,
            }
        })?;
        Ok(Self { environment, store })
    }
}
