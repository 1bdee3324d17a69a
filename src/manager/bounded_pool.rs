use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::ManagerInner;
use crate::connection::{Connection, ConnectionId, ConnectionInner, Origin};
use crate::error::{ConnError, ConnResult};
use crate::traits::Driver;

/// A bounded set of connections recycled through a FIFO idle queue.
///
/// Instances are opened lazily, up to `capacity`. A released connection
/// leaves its instance at the back of the idle queue and the next checkout
/// takes the oldest one. At capacity with nothing idle, checkout fails fast.
pub(crate) struct BoundedPool<D: Driver> {
    capacity: usize,
    state: Mutex<PoolState<D>>,
}

struct PoolState<D: Driver> {
    idle: VecDeque<IdleEntry<D>>,
    checked_out: HashMap<ConnectionId, Weak<ConnectionInner<D>>>,
    /// Idle plus checked-out instances
    tracked: usize,
    closed: bool,
}

struct IdleEntry<D: Driver> {
    instance: Arc<D::Instance>,
    resource: usize,
}

enum Checkout<D: Driver> {
    Reuse(IdleEntry<D>),
    Open,
}

impl<D: Driver> BoundedPool<D> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(capacity),
                checked_out: HashMap::with_capacity(capacity),
                tracked: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn get(&self, manager: &Arc<ManagerInner<D>>) -> ConnResult<Connection<D>> {
        let checkout = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(ConnError::ManagerUnavailable);
            }
            if let Some(entry) = state.idle.pop_front() {
                manager.with_stats(|stats| stats.adjust(0, -1, 1));
                Checkout::Reuse(entry)
            } else if state.tracked < self.capacity {
                // Reserve the slot before the driver call
                state.tracked += 1;
                Checkout::Open
            } else {
                tracing::debug!(capacity = self.capacity, "connection pool exhausted");
                return Err(ConnError::PoolExhausted(self.capacity));
            }
        };

        let (instance, resource) = match checkout {
            Checkout::Reuse(entry) => {
                if let Err(err) = manager.revive(&entry.instance, entry.resource) {
                    self.discard(manager, &entry.instance);
                    return Err(err);
                }
                (entry.instance, entry.resource)
            }
            Checkout::Open => {
                let resource = manager.next_resource();
                match manager.open_instance(resource) {
                    Ok(instance) => {
                        let _state = self.state.lock();
                        manager.with_stats(|stats| stats.adjust(1, 0, 1));
                        (instance, resource)
                    }
                    Err(err) => {
                        let mut state = self.state.lock();
                        state.tracked = state.tracked.saturating_sub(1);
                        return Err(err);
                    }
                }
            }
        };

        let connection = Connection::new(manager.clone(), instance, resource, Origin::Pooled);
        let registered = {
            let mut state = self.state.lock();
            if state.closed {
                false
            } else {
                state.checked_out.insert(connection.id(), connection.downgrade());
                true
            }
        };
        if !registered {
            // Closed while the instance was being prepared
            if let Err(err) = connection.release() {
                tracing::warn!(connection = %connection.id(), error = %err, "failed to release connection after close");
            }
            return Err(ConnError::ManagerUnavailable);
        }
        Ok(connection)
    }

    /// Drops a checked-out instance that failed its health check.
    fn discard(&self, manager: &ManagerInner<D>, instance: &D::Instance) {
        {
            let mut state = self.state.lock();
            state.tracked = state.tracked.saturating_sub(1);
            manager.with_stats(|stats| stats.adjust(-1, 0, -1));
        }
        if let Err(err) = manager.close_instance(instance) {
            tracing::warn!(error = %err, "failed to close unhealthy connection");
        }
    }

    /// Returns the instance to the idle queue, or closes it once the pool is closed.
    pub(crate) fn finalize(&self, manager: &ManagerInner<D>, connection: &ConnectionInner<D>) -> ConnResult<()> {
        let recycled = {
            let mut state = self.state.lock();
            state.checked_out.remove(&connection.id);
            if state.closed {
                state.tracked = state.tracked.saturating_sub(1);
                manager.with_stats(|stats| stats.adjust(-1, 0, -1));
                false
            } else {
                state.idle.push_back(IdleEntry {
                    instance: connection.instance.clone(),
                    resource: connection.resource,
                });
                manager.with_stats(|stats| stats.adjust(0, 1, -1));
                true
            }
        };
        if recycled {
            tracing::trace!(connection = %connection.id, "instance returned to pool");
            Ok(())
        } else {
            manager.close_instance(&connection.instance)
        }
    }

    /// Frees the slot held by a detached connection.
    pub(crate) fn detach(&self, manager: &ManagerInner<D>, connection: &ConnectionInner<D>) {
        let mut state = self.state.lock();
        if state.checked_out.remove(&connection.id).is_some() {
            state.tracked = state.tracked.saturating_sub(1);
            manager.with_stats(|stats| stats.adjust(-1, 0, -1));
        }
    }

    /// Marks the pool closed and takes every idle entry out of it.
    fn drain_idle(state: &mut PoolState<D>, manager: &ManagerInner<D>) -> Vec<IdleEntry<D>> {
        state.closed = true;
        let idle: Vec<IdleEntry<D>> = state.idle.drain(..).collect();
        state.tracked = state.tracked.saturating_sub(idle.len());
        let drained = idle.len() as i64;
        manager.with_stats(|stats| stats.adjust(-drained, -drained, 0));
        idle
    }

    /// Closes the idle instances of a pool whose manager is going away.
    ///
    /// Nothing can be checked out at that point: every live connection
    /// keeps its manager alive.
    pub(crate) fn shutdown(&self, manager: &ManagerInner<D>) {
        let idle = Self::drain_idle(&mut self.state.lock(), manager);
        if !idle.is_empty() {
            tracing::debug!(idle = idle.len(), "closing idle pooled connections on drop");
        }
        for entry in &idle {
            if let Err(err) = manager.close_instance(&entry.instance) {
                tracing::warn!(resource = entry.resource, error = %err, "failed to close idle connection");
            }
        }
    }

    /// Closes idle instances and finalizes every checked-out connection.
    pub(crate) fn close(&self, manager: &ManagerInner<D>) -> ConnResult<()> {
        let (idle, checked_out) = {
            let mut state = self.state.lock();
            let idle = Self::drain_idle(&mut state, manager);
            let checked_out: Vec<Connection<D>> = state
                .checked_out
                .values()
                .filter_map(Weak::upgrade)
                .map(Connection::from_inner)
                .collect();
            (idle, checked_out)
        };
        tracing::debug!(
            idle = idle.len(),
            checked_out = checked_out.len(),
            "closing pooled connections"
        );

        let mut first_error = None;
        for entry in &idle {
            if let Err(err) = manager.close_instance(&entry.instance) {
                tracing::warn!(resource = entry.resource, error = %err, "failed to close idle connection");
                first_error.get_or_insert(err);
            }
        }
        let swept = manager.force_release_all(checked_out);
        match (first_error, swept) {
            (Some(err), _) | (None, Err(err)) => Err(err),
            (None, Ok(())) => Ok(()),
        }
    }
}
