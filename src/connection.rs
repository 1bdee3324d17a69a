//! Connection handles and their state machine.
//!
//! A [`Connection`] wraps one driver instance and the manager that issued it.
//! Its status only moves forward:
//!
//! ```text
//! Available ──release()──▶ WaitRelease ──manager finalize──▶ Unavailable
//!     │                                                          ▲
//!     └────────────── manager close() (forced) ─────────────────┘
//! ```
//!
//! `detach()` leaves the status alone and cuts the connection loose from the
//! manager's bookkeeping and from any context teardown hook.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::{ContextId, TeardownKey, WeakContext};
use crate::error::{ConnError, ConnResult};
use crate::manager::{ConnectionManager, ManagerInner};
use crate::traits::Driver;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Usable; the only status in which getInstance/release/detach succeed
    Available,
    /// Released by its holder, waiting for the manager to finalize it
    WaitRelease,
    /// Finalized; the handle is dead
    Unavailable,
}

/// Process-unique identity of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is tracked, which decides how it is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Not tracked by the manager; closed on release
    Untracked,
    /// Cached for one request context
    Context(ContextId),
    /// Checked out of a bounded pool
    Pooled,
}

struct ConnectionState {
    status: ConnectionStatus,
    detached: bool,
    teardown: Option<(WeakContext, TeardownKey)>,
}

pub(crate) struct ConnectionInner<D: Driver> {
    pub(crate) id: ConnectionId,
    pub(crate) manager: Arc<ManagerInner<D>>,
    pub(crate) instance: Arc<D::Instance>,
    pub(crate) resource: usize,
    pub(crate) origin: Origin,
    state: Mutex<ConnectionState>,
}

impl<D: Driver> ConnectionInner<D> {
    pub(crate) fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Available → WaitRelease on behalf of the holder.
    pub(crate) fn begin_release(&self) -> ConnResult<()> {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Available {
            return Err(ConnError::ConnectionNotAvailable);
        }
        state.status = ConnectionStatus::WaitRelease;
        Ok(())
    }

    /// Available → WaitRelease on behalf of the manager.
    ///
    /// Returns false when the connection is detached or someone else already
    /// started releasing it.
    pub(crate) fn begin_forced_release(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Available || state.detached {
            return false;
        }
        state.status = ConnectionStatus::WaitRelease;
        true
    }

    /// Available → WaitRelease on behalf of a context teardown hook.
    ///
    /// Same check as the forced path: a connection detached at any point
    /// before this call is left alone.
    pub(crate) fn begin_teardown_release(&self) -> bool {
        self.begin_forced_release()
    }

    pub(crate) fn mark_unavailable(&self) {
        self.state.lock().status = ConnectionStatus::Unavailable;
    }

    /// Records the teardown hook that auto-releases this connection.
    ///
    /// Returns false, storing nothing, if the connection already left Available.
    pub(crate) fn set_teardown(&self, context: WeakContext, key: TeardownKey) -> bool {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Available || state.detached {
            return false;
        }
        state.teardown = Some((context, key));
        true
    }

    pub(crate) fn take_teardown(&self) -> Option<(WeakContext, TeardownKey)> {
        self.state.lock().teardown.take()
    }
}

impl<D: Driver> Drop for ConnectionInner<D> {
    fn drop(&mut self) {
        {
            let state = self.state.get_mut();
            if state.status != ConnectionStatus::Available || state.detached {
                return;
            }
            state.status = ConnectionStatus::WaitRelease;
        }
        let this: &Self = self;
        match this.manager.release_connection(this) {
            Ok(()) => tracing::debug!(connection = %this.id, "connection auto-released on drop"),
            Err(err) => tracing::warn!(connection = %this.id, error = %err, "auto-release on drop failed"),
        }
    }
}

/// Handle to one driver instance issued by a [`ConnectionManager`].
///
/// Clones share the same connection. Call [`release`](Self::release) when
/// done; if every handle is dropped while the connection is still Available,
/// it is released automatically. The automatic path is a safety net, so
/// prefer releasing explicitly.
///
/// Connections cached for a request context are also held by their manager,
/// so those are released when the context ends rather than on drop.
pub struct Connection<D: Driver> {
    pub(crate) inner: Arc<ConnectionInner<D>>,
}

impl<D: Driver> Connection<D> {
    pub(crate) fn new(
        manager: Arc<ManagerInner<D>>,
        instance: Arc<D::Instance>,
        resource: usize,
        origin: Origin,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
                manager,
                instance,
                resource,
                origin,
                state: Mutex::new(ConnectionState {
                    status: ConnectionStatus::Available,
                    detached: false,
                    teardown: None,
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner<D>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner<D>> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status()
    }

    /// The manager that issued this connection.
    pub fn manager(&self) -> ConnectionManager<D> {
        ConnectionManager::from_inner(self.inner.manager.clone())
    }

    /// The request context this connection is cached for, if any.
    pub fn context_id(&self) -> Option<ContextId> {
        match self.inner.origin {
            Origin::Context(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.inner.is_detached()
    }

    /// Borrows the driver instance.
    ///
    /// Fails with [`ConnError::ConnectionNotAvailable`] unless the connection
    /// is Available.
    pub fn instance(&self) -> ConnResult<Arc<D::Instance>> {
        if self.status() != ConnectionStatus::Available {
            return Err(ConnError::ConnectionNotAvailable);
        }
        Ok(self.inner.instance.clone())
    }

    /// Returns the connection to its manager.
    ///
    /// Moves to WaitRelease, lets the manager finalize it (close, recycle or
    /// drop from the context cache, depending on the strategy), then ends in
    /// Unavailable. Works after the manager was closed.
    pub fn release(&self) -> ConnResult<()> {
        self.inner.begin_release()?;
        self.inner.manager.release_connection(&self.inner)
    }

    /// Removes the connection from manager tracking.
    ///
    /// The connection stops counting toward statistics and pool capacity, is no
    /// longer released when its context ends, and survives the manager's
    /// `close()`. Its status stays Available and the instance stays usable until
    /// the holder releases it or drops the instance.
    pub fn detach(&self) -> ConnResult<()> {
        let teardown = {
            let mut state = self.inner.state.lock();
            if state.status != ConnectionStatus::Available {
                return Err(ConnError::ConnectionNotAvailable);
            }
            if state.detached {
                return Ok(());
            }
            state.detached = true;
            state.teardown.take()
        };
        if let Some((context, key)) = teardown {
            context.cancel(key);
        }
        self.inner.manager.detach_connection(&self.inner);
        Ok(())
    }

    /// Release triggered by a context teardown hook.
    pub(crate) fn release_on_teardown(&self) {
        // Status and detach flag are checked under one lock; a concurrent
        // detach or explicit release wins and the hook does nothing
        if !self.inner.begin_teardown_release() {
            return;
        }
        match self.inner.manager.release_connection(&self.inner) {
            Ok(()) => tracing::debug!(connection = %self.id(), "connection released by context teardown"),
            Err(err) => tracing::warn!(connection = %self.id(), error = %err, "context teardown release failed"),
        }
    }

    /// True if both handles refer to the same connection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: Driver> Clone for Connection<D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<D: Driver> PartialEq for Connection<D> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<D: Driver> Eq for Connection<D> {}

impl<D: Driver> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .field("origin", &self.inner.origin)
            .field("detached", &self.is_detached())
            .finish()
    }
}
