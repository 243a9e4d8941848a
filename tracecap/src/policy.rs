//! Privileged policy acquisition.
//!
//! Some instruments need privileged resources (kernel trace access, perf
//! counters) that are granted through a system-level control channel. Before
//! any instrument's `prepare` runs, the coordinator asks a [`PolicyBroker`]
//! to acquire the union of everything the instrument set declares. A broker
//! failure aborts the session before instruments do any work.
//!
//! The broker is a trait so tests and embedders can substitute their own
//! transport; the production [`SystemBusBroker`] connects to the system bus
//! socket.

use crate::domain::PolicyError;
use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;
use tokio::net::UnixStream;

/// Default system control channel socket.
pub const SYSTEM_BUS_SOCKET: &str = "/run/dbus/system_bus_socket";

/// Asynchronous gateway to the privileged control channel.
#[async_trait]
pub trait PolicyBroker: Send + Sync {
    /// Acquire access for the given policy identifiers.
    ///
    /// Called with a non-empty, deduplicated list. Success means recording
    /// may proceed; failure is surfaced verbatim as the session's policy
    /// acquisition error.
    async fn acquire(&self, policies: &[String]) -> Result<(), PolicyError>;
}

/// Broker backed by the system message bus.
///
/// Reaching the bus is the grant check: the policy daemon rides on the
/// system bus, so an unreachable socket means privileged instruments cannot
/// be serviced. The connection is not held open.
pub struct SystemBusBroker {
    socket: PathBuf,
}

impl SystemBusBroker {
    pub fn new() -> Self {
        Self { socket: PathBuf::from(SYSTEM_BUS_SOCKET) }
    }

    /// Use a non-default socket path.
    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }
}

impl Default for SystemBusBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyBroker for SystemBusBroker {
    async fn acquire(&self, policies: &[String]) -> Result<(), PolicyError> {
        debug!("acquiring policy via {}: {policies:?}", self.socket.display());
        UnixStream::connect(&self.socket).await.map_err(PolicyError::Connect)?;
        Ok(())
    }
}
