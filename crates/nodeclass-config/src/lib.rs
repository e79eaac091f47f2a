//! Configuration shared by the nodeclass handler binaries.
//!
//! Handlers are launched by the orchestrator with a single positional
//! argument: the TCP port to listen on. Everything else has a default that
//! can be overridden on the command line or through `NODECLASS_*`
//! environment variables. Command-line values win over the environment,
//! which wins over the compiled-in defaults.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOCK_PORT, DEFAULT_LOG_FILTER, DEFAULT_STORE_FILE, default_log_filter,
    default_log_format,
};
pub use logging::LogFormat;

/// Errors raised while assembling a [`HandlerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line or environment input could not be parsed.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    /// The store file name was empty or contained a path separator.
    #[error("store file name '{name}' must be a bare, non-empty file name")]
    InvalidStoreFile {
        /// Offending value.
        name: String,
    },
}

impl ConfigError {
    /// Returns true when the error is a request for help or version output
    /// rather than a genuine failure.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        match self {
            Self::Arguments(error) => matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ),
            Self::InvalidStoreFile { .. } => false,
        }
    }
}

/// Runtime configuration for a single handler process.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(about = "Serves one orchestrator connection of store-backed requests")]
pub struct HandlerConfig {
    /// TCP port the orchestrator will connect to.
    port: u16,

    /// Loopback port used as the cross-process store lock.
    #[arg(long, env = "NODECLASS_LOCK_PORT", default_value_t = DEFAULT_LOCK_PORT)]
    lock_port: u16,

    /// Tracing filter expression, for example `info` or `nodeclass_plugin=debug`.
    #[arg(long, env = "NODECLASS_LOG", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// Log output format (`json` or `compact`).
    #[arg(long, env = "NODECLASS_LOG_FORMAT", default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// JSON catalogue of environments the handler may serve.
    #[arg(long, env = "NODECLASS_ENV_CATALOG")]
    env_catalog: Option<Utf8PathBuf>,

    /// File name appended to the store path supplied with each request.
    #[arg(long, env = "NODECLASS_STORE_FILE", default_value = DEFAULT_STORE_FILE)]
    store_file: String,
}

impl HandlerConfig {
    /// Builds a configuration for `port` with every other value defaulted.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            lock_port: DEFAULT_LOCK_PORT,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            env_catalog: None,
            store_file: DEFAULT_STORE_FILE.to_owned(),
        }
    }

    /// Parses the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments are malformed or fail
    /// validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Parses an explicit argument list. The first item is the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments are malformed or fail
    /// validation.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.store_file.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(ConfigError::InvalidStoreFile {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Overrides the lock port.
    #[must_use]
    pub const fn with_lock_port(mut self, lock_port: u16) -> Self {
        self.lock_port = lock_port;
        self
    }

    /// Sets the environment catalogue path.
    #[must_use]
    pub fn with_env_catalog(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.env_catalog = Some(path.into());
        self
    }

    /// Overrides the store file name.
    #[must_use]
    pub fn with_store_file(mut self, name: impl Into<String>) -> Self {
        self.store_file = name.into();
        self
    }

    /// Port the handler listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Address the handler binds: every interface on [`Self::port`].
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Port used for the cross-process lock.
    #[must_use]
    pub const fn lock_port(&self) -> u16 {
        self.lock_port
    }

    /// Loopback address whose exclusive bind constitutes holding the lock.
    #[must_use]
    pub const fn lock_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.lock_port))
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Environment catalogue path, when configured.
    #[must_use]
    pub fn env_catalog(&self) -> Option<&Utf8Path> {
        self.env_catalog.as_deref()
    }

    /// File name appended to each request's store path.
    #[must_use]
    pub fn store_file(&self) -> &str {
        self.store_file.as_str()
    }
}
