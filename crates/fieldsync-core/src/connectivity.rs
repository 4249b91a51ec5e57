//! Connectivity oracle consumed by repositories and the sync orchestrator.
//!
//! The engine never probes the network itself. Callers inject an oracle that
//! answers one coarse question: can the remote service be reached right now.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of the "is connected" signal.
pub trait ConnectivityOracle: Send + Sync {
    /// Whether the remote service is currently reachable.
    fn is_connected(&self) -> bool;
}

impl<T: ConnectivityOracle + ?Sized> ConnectivityOracle for Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<T: ConnectivityOracle + ?Sized> ConnectivityOracle for &T {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Shared, cloneable connectivity toggle.
///
/// Clones observe the same state, so a platform listener can flip the flag
/// while repositories hold their own handle.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    connected: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Update the connectivity state, logging transitions.
    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            if connected {
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost; switching to offline mode");
            }
        }
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::offline()
    }
}

impl ConnectivityOracle for ConnectivityFlag {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
