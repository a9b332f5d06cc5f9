//! Ephemeral port discovery for mock servers.
//!
//! The OS picks a free port when a listener binds to port 0. The listener is
//! dropped right away, so the port is only free "at the time of asking": another
//! process may grab it before the caller binds. That window is accepted for
//! test-only use.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Mutex;

use tracing::debug;

use crate::error::Error;

const MAX_ATTEMPTS: usize = 16;

/// Ask the OS for a port that is currently unused on the loopback interface
pub fn allocate_port() -> Result<u16, Error> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .map_err(|e| Error::PortAllocation(format!("cannot bind an ephemeral port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::PortAllocation(format!("cannot read the assigned port: {e}")))?
        .port();
    Ok(port)
}

/// Hands out ephemeral ports and never returns a port it still considers issued
#[derive(Debug, Default)]
pub struct PortAllocator {
    issued: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a port not previously issued by this allocator
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortAllocation`] if the OS cannot provide a port, or if
    /// it keeps handing back ports that are already issued.
    pub fn allocate(&self) -> Result<u16, Error> {
        for _ in 0..MAX_ATTEMPTS {
            let port = allocate_port()?;
            let mut issued = self
                .issued
                .lock()
                .map_err(|_| Error::PortAllocation("port registry lock poisoned".to_string()))?;
            if issued.insert(port) {
                debug!(port, "Allocated ephemeral port");
                return Ok(port);
            }
            debug!(port, "OS returned an already issued port, retrying");
        }

        Err(Error::PortAllocation(format!(
            "no fresh port after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Forget a port once the server using it has stopped
    pub fn release(&self, port: u16) {
        if let Ok(mut issued) = self.issued.lock() {
            issued.remove(&port);
        }
    }

    /// Whether the port is currently issued by this allocator
    pub fn is_issued(&self, port: u16) -> bool {
        self.issued
            .lock()
            .map(|issued| issued.contains(&port))
            .unwrap_or(false)
    }

    /// Number of ports currently issued
    pub fn issued_count(&self) -> usize {
        self.issued.lock().map(|issued| issued.len()).unwrap_or(0)
    }
}
