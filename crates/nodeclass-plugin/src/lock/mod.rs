//! Cross-process store lock built on exclusive loopback port binding.
//!
//! Holding the lock means holding a bound [`TcpListener`] on a fixed
//! loopback address. The operating system refuses a second bind of the same
//! address, so bind atomicity is the whole mutual-exclusion test and the lock
//! is released automatically if the holder dies.
//!
//! The lock key is one port for the whole host, not one per store file:
//! every handler configured with the same port serialises against every
//! other. Acquisition retries forever at a fixed interval, so a foreign
//! process that keeps the port bound blocks all handlers indefinitely.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

const LOCK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lock");

/// Pause between failed bind attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory lock shared by every process that binds the same address.
///
/// The lock is not reentrant: calling [`PortLock::acquire`] while this
/// handle already holds the address spins forever.
///
/// # Example
///
/// ```no_run
/// use nodeclass_plugin::lock::PortLock;
///
/// let mut lock = PortLock::loopback(49993);
/// {
///     let _held = lock.hold();
///     // store access happens here
/// }
/// assert!(!lock.is_held());
/// ```
#[derive(Debug)]
pub struct PortLock {
    address: SocketAddr,
    listener: Option<TcpListener>,
}

impl PortLock {
    /// Creates an unbound lock for `address`.
    #[must_use]
    pub const fn new(address: SocketAddr) -> Self {
        Self {
            address,
            listener: None,
        }
    }

    /// Creates an unbound lock on `127.0.0.1:port`.
    #[must_use]
    pub const fn loopback(port: u16) -> Self {
        Self::new(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
    }

    /// Returns the address whose bind constitutes the lock.
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns true while this handle holds the bound listener.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.listener.is_some()
    }

    /// Blocks until the address can be bound.
    ///
    /// Every bind failure, whatever its cause, is treated as contention and
    /// retried after [`RETRY_INTERVAL`]. There is no timeout.
    pub fn acquire(&mut self) {
        let mut attempts: u64 = 0;
        while !self.try_acquire() {
            attempts = attempts.saturating_add(1);
            thread::sleep(RETRY_INTERVAL);
        }
        debug!(
            target: LOCK_TARGET,
            address = %self.address,
            retries = attempts,
            "store lock acquired"
        );
    }

    /// Makes a single bind attempt, returning whether the lock is now held.
    ///
    /// A handle that already holds the lock fails here like any other
    /// contender.
    pub fn try_acquire(&mut self) -> bool {
        match TcpListener::bind(self.address) {
            Ok(listener) => {
                self.listener = Some(listener);
                true
            }
            Err(error) => {
                trace!(
                    target: LOCK_TARGET,
                    address = %self.address,
                    error = %error,
                    "store lock busy"
                );
                false
            }
        }
    }

    /// Unbinds the listener. Releasing an unheld lock does nothing.
    pub fn release(&mut self) {
        if self.listener.take().is_some() {
            debug!(target: LOCK_TARGET, address = %self.address, "store lock released");
        }
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn hold(&mut self) -> PortLockGuard<'_> {
        self.acquire();
        PortLockGuard { lock: self }
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scoped hold on a [`PortLock`]; the lock is released when this drops.
#[derive(Debug)]
pub struct PortLockGuard<'a> {
    lock: &'a mut PortLock,
}

impl Drop for PortLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Helpers for tests that need an otherwise unused loopback port.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use std::io;
    use std::net::TcpListener;

    /// Asks the OS for a free loopback port and immediately releases it.
    ///
    /// # Errors
    ///
    /// Returns the bind error when no ephemeral port is available.
    pub fn free_loopback_port() -> io::Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        Ok(listener.local_addr()?.port())
    }
}
