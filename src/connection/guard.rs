use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use super::manager::Manager;

/// RAII handle for one admitted client connection. Dropping it releases the
/// global/per-IP semaphore permits and spawns a task to decrement the
/// manager's active-connection count for this address.
pub struct ConnectionGuard {
    manager: Arc<Manager>,
    addr: SocketAddr,
    _global_permit: OwnedSemaphorePermit,
    _per_ip_permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionGuard {
    pub(super) fn new(
        manager: Arc<Manager>,
        addr: SocketAddr,
        global_permit: OwnedSemaphorePermit,
        per_ip_permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            manager,
            addr,
            _global_permit: global_permit,
            _per_ip_permit: per_ip_permit,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let manager = Arc::clone(&self.manager);
        let addr = self.addr;
        tokio::spawn(async move {
            manager.on_disconnect(addr).await;
        });
    }
}
