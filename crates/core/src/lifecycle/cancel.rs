//! Cancellation token with scoped resource registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// An external resource that can be torn down on demand.
///
/// `stop` must be idempotent and safe to call after the resource has
/// finished on its own.
#[async_trait]
pub trait Stoppable: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Tear the resource down.
    async fn stop(&self);
}

struct Registered {
    id: u64,
    resource: Arc<dyn Stoppable>,
}

/// Cancellation state for one task.
///
/// Cloning shares the same flag and resource slot. Once cancelled it stays
/// cancelled.
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    slot: Arc<Mutex<Option<Registered>>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The underlying token, for `select!` in code that does not know about
    /// resource registration.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Set the flag and tear down the registered resource, if any.
    ///
    /// Returns once the resource's `stop` has completed.
    pub async fn cancel(&self) {
        self.token.cancel();
        let registered = self.lock_slot().take();
        if let Some(registered) = registered {
            info!("Stopping {}", registered.resource.describe());
            registered.resource.stop().await;
        }
    }

    /// Register the resource to stop on cancel.
    ///
    /// Replaces any previously registered resource. If the handle is already
    /// cancelled the resource is stopped right away.
    pub fn register(&self, resource: Arc<dyn Stoppable>) -> ResourceGuard {
        let id = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.lock_slot();
        if self.token.is_cancelled() {
            drop(slot);
            debug!("Registered {} after cancel, stopping", resource.describe());
            tokio::spawn(async move { resource.stop().await });
        } else {
            *slot = Some(Registered { id, resource });
        }
        ResourceGuard {
            id,
            slot: Arc::clone(&self.slot),
        }
    }

    /// Whether a resource is currently registered.
    pub fn has_resource(&self) -> bool {
        self.lock_slot().is_some()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<Registered>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Unregisters its resource when dropped.
///
/// A guard only clears the slot if the slot still holds its own resource, so
/// a stale guard never unregisters a newer one.
pub struct ResourceGuard {
    id: u64,
    slot: Arc<Mutex<Option<Registered>>>,
}

impl ResourceGuard {
    /// Explicitly unregister (same as dropping).
    pub fn unregister(self) {}
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map(|r| r.id) == Some(self.id) {
            *slot = None;
        }
    }
}
