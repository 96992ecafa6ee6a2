//! Handles supplied by the hosting process.
//!
//! The registry has no logic of its own for IPC or shutdown. It only hands
//! out what the process gave it: the runtime that drives plugin IPC, and a
//! signal that fires when the process starts shutting down.

use tokio::runtime::Handle;
use tokio::sync::watch;

/// Process-wide shutdown signal. Cloning shares the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Idempotent.
    pub fn signal(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_signalled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|signalled| *signalled).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// What the hosting process provides to the registry.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    io_handle: Option<Handle>,
    shutdown: ShutdownSignal,
}

impl HostContext {
    pub fn new(io_handle: Option<Handle>, shutdown: ShutdownSignal) -> Self {
        Self {
            io_handle,
            shutdown,
        }
    }

    /// Context bound to the current tokio runtime, if there is one.
    pub fn current() -> Self {
        Self::new(Handle::try_current().ok(), ShutdownSignal::new())
    }

    /// Runtime driving plugin IPC. `None` outside a plugin-hosting process.
    pub fn io_handle(&self) -> Option<&Handle> {
        self.io_handle.as_ref()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}
