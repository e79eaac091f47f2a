//! Spawns handler binaries for process-level tests.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use super::client::RpcClient;
use crate::lock::test_support::free_loopback_port;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A handler binary running on a free loopback port.
///
/// The child is killed on drop unless it already exited.
#[derive(Debug)]
pub struct HandlerProcess {
    child: Child,
    port: u16,
}

impl HandlerProcess {
    /// Starts `binary` on a free port, sharing `lock_port` and resolving
    /// environments from `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error when no port is free or the binary cannot start.
    pub fn spawn(binary: impl AsRef<Path>, lock_port: u16, catalog: &Path) -> io::Result<Self> {
        let port = free_loopback_port()?;
        let child = Command::new(binary.as_ref())
            .arg(port.to_string())
            .env("NODECLASS_LOCK_PORT", lock_port.to_string())
            .env("NODECLASS_ENV_CATALOG", catalog)
            .env("NODECLASS_LOG", "warn")
            .env_remove("NODECLASS_STORE_FILE")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Self { child, port })
    }

    /// Opens the single orchestrator connection.
    ///
    /// # Errors
    ///
    /// Returns the connection error if the handler never starts listening.
    pub fn connect(&self) -> io::Result<RpcClient> {
        RpcClient::connect(
            SocketAddr::from((Ipv4Addr::LOCALHOST, self.port)),
            CONNECT_TIMEOUT,
        )
    }

    /// Waits for the handler to exit, which it does once its connection
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns the error from waiting on the child.
    pub fn wait(mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }
}

impl Drop for HandlerProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.child.kill().ok();
            self.child.wait().ok();
        }
    }
}
