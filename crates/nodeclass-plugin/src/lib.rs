//! Hosting runtime for nodeclass store handlers.
//!
//! A handler is a short-lived process spawned by the orchestrator with a
//! single argument, the port to listen on. It accepts one connection, and
//! for each call on it routes an HTTP-style [`protocol::RequestEnvelope`] to
//! a [`RequestHandler`] method by verb. Handlers authorise the caller through
//! an [`auth::EnvironmentResolver`], then read and write a private SQLite
//! [`store::Store`] whose every access is serialised across processes by a
//! [`lock::PortLock`].
//!
//! ```no_run
//! use nodeclass_config::HandlerConfig;
//! use nodeclass_plugin::auth::CatalogResolver;
//! use nodeclass_plugin::{RequestHandler, run_handler};
//!
//! struct Nothing;
//! impl RequestHandler for Nothing {}
//!
//! let config = HandlerConfig::load()?;
//! let resolver = CatalogResolver::new(config.env_catalog());
//! run_handler(&config, &Nothing, Box::new(resolver))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod auth;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod lock;
pub mod protocol;
pub mod store;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::process::ExitCode;

use nodeclass_config::{ConfigError, HandlerConfig};
use tracing::{error, info};

pub use auth::{Environment, EnvironmentResolver};
pub use context::{HandlerContext, Preamble};
pub use dispatch::{RequestHandler, Verb, decode_body, dispatch, record_id};
pub use error::{HandlerError, HandlerResult};
pub use protocol::{ReplyEnvelope, RequestEnvelope};
pub use transport::ServeError;

/// Runs a handler process: binds the configured port, serves the single
/// orchestrator connection, and returns once the peer disconnects.
///
/// # Errors
///
/// Returns [`ServeError`] when the port cannot be bound, the connection
/// cannot be accepted, or the connection fails mid-stream.
pub fn run_handler<H>(
    config: &HandlerConfig,
    handler: &H,
    resolver: Box<dyn EnvironmentResolver + Send>,
) -> Result<(), ServeError>
where
    H: RequestHandler + ?Sized,
{
    let mut context = HandlerContext::from_config(config, resolver);
    let server = transport::Server::bind(config.listen_address())?;
    server.serve_one(handler, &mut context)?;
    Ok(())
}

/// Entry point shared by the handler binaries.
///
/// Loads configuration from the command line and environment, installs
/// telemetry, resolves environments from the configured catalogue and
/// serves the orchestrator connection. Failures are logged and reported on
/// stderr; the exit code is non-zero only when the process could not serve.
#[must_use]
pub fn launch<H>(handler: &H) -> ExitCode
where
    H: RequestHandler + ?Sized,
{
    let config = match HandlerConfig::load() {
        Ok(config) => config,
        Err(config_error) => {
            // clap renders its own usage text, on stdout for --help.
            if let ConfigError::Arguments(clap_error) = &config_error {
                clap_error.print().ok();
            } else {
                writeln!(io::stderr().lock(), "{config_error}").ok();
            }
            return if config_error.is_informational() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    if let Err(telemetry_error) = telemetry::initialise(&config) {
        writeln!(io::stderr().lock(), "{telemetry_error}").ok();
        return ExitCode::FAILURE;
    }

    let resolver = auth::CatalogResolver::new(config.env_catalog());
    match run_handler(&config, handler, Box::new(resolver)) {
        Ok(()) => {
            info!(port = config.port(), "handler finished");
            ExitCode::SUCCESS
        }
        Err(serve_error) => {
            error!(port = config.port(), error = %serve_error, "handler failed");
            writeln!(io::stderr().lock(), "{serve_error}").ok();
            ExitCode::FAILURE
        }
    }
}
