use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ManagerInner;
use crate::connection::{Connection, ConnectionInner, ConnectionStatus, Origin};
use crate::context::{ContextId, RequestContext};
use crate::error::{ConnError, ConnResult};
use crate::traits::Driver;

/// One cached connection per request context.
///
/// The cache holds a strong handle, so a cached connection lives until it is
/// released, detached, its context ends, or the manager closes.
pub(crate) struct ContextSingleton<D: Driver> {
    cache: Mutex<HashMap<ContextId, Connection<D>>>,
}

impl<D: Driver> ContextSingleton<D> {
    pub(crate) fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(
        &self,
        manager: &Arc<ManagerInner<D>>,
        context: &RequestContext,
    ) -> ConnResult<Connection<D>> {
        if context.is_ended() {
            return Err(ConnError::ContextEnded);
        }

        if let Some(cached) = self.cached(context.id()) {
            manager.revive(&cached.inner.instance, cached.inner.resource)?;
            return Ok(cached);
        }

        // Driver work happens outside the cache lock
        let resource = manager.next_resource();
        let instance = manager.open_instance(resource)?;
        let connection = Connection::new(
            manager.clone(),
            instance,
            resource,
            Origin::Context(context.id()),
        );

        let stale = {
            let mut cache = self.cache.lock();
            if !manager.is_available() {
                drop(cache);
                discard(&connection);
                return Err(ConnError::ManagerUnavailable);
            }
            if let Some(existing) = cache.get(&context.id()) {
                if existing.status() == ConnectionStatus::Available {
                    // Another thread on the same context won the race
                    let existing = existing.clone();
                    drop(cache);
                    discard(&connection);
                    return Ok(existing);
                }
            }
            cache.insert(context.id(), connection.clone())
        };
        // A replaced entry is mid-release and hands its slot to the new one
        if stale.is_none() {
            manager.with_stats(|stats| stats.adjust(1, 0, 1));
        }

        let weak = connection.downgrade();
        let registered = context.register_teardown(move || {
            if let Some(inner) = weak.upgrade() {
                Connection::from_inner(inner).release_on_teardown();
            }
        });
        match registered {
            Ok(key) => {
                if !connection.inner.set_teardown(context.downgrade(), key) {
                    context.cancel_teardown(key);
                }
            }
            Err(err) => {
                // The context ended while the connection was being opened
                if let Err(release_err) = connection.release() {
                    tracing::warn!(connection = %connection.id(), error = %release_err, "failed to release orphaned connection");
                }
                return Err(err);
            }
        }

        tracing::debug!(connection = %connection.id(), context = %context.id(), "connection bound to context");
        Ok(connection)
    }

    fn cached(&self, context: ContextId) -> Option<Connection<D>> {
        self.cache
            .lock()
            .get(&context)
            .filter(|conn| conn.status() == ConnectionStatus::Available)
            .cloned()
    }

    /// Drops the cache entry, if it still belongs to `connection`, and closes
    /// the instance.
    pub(crate) fn finalize(
        &self,
        manager: &ManagerInner<D>,
        context: ContextId,
        connection: &ConnectionInner<D>,
    ) -> ConnResult<()> {
        if let Some(removed) = self.remove(context, connection) {
            manager.with_stats(|stats| stats.adjust(-1, 0, -1));
            drop(removed);
        }
        manager.close_instance(&connection.instance)
    }

    pub(crate) fn detach(&self, manager: &ManagerInner<D>, context: ContextId, connection: &ConnectionInner<D>) {
        if let Some(removed) = self.remove(context, connection) {
            manager.with_stats(|stats| stats.adjust(-1, 0, -1));
            drop(removed);
        }
    }

    fn remove(&self, context: ContextId, connection: &ConnectionInner<D>) -> Option<Connection<D>> {
        let mut cache = self.cache.lock();
        match cache.get(&context) {
            Some(entry) if entry.id() == connection.id => cache.remove(&context),
            _ => None,
        }
    }

    /// Finalizes every cached connection.
    pub(crate) fn close(&self, manager: &ManagerInner<D>) -> ConnResult<()> {
        let connections: Vec<Connection<D>> = self.cache.lock().values().cloned().collect();
        tracing::debug!(connections = connections.len(), "releasing context-bound connections");
        manager.force_release_all(connections)
    }
}

/// Releases a connection that lost a race before anyone saw it.
fn discard<D: Driver>(connection: &Connection<D>) {
    if let Err(err) = connection.release() {
        tracing::warn!(connection = %connection.id(), error = %err, "failed to discard connection");
    }
}
