//! Connection manager module.
//!
//! This module contains the [`ConnectionManager`] type and the three
//! strategies it can run. Shared bookkeeping (availability, statistics,
//! resource selection, driver calls) lives in `ManagerInner`; each strategy
//! only decides where a connection is cached and what finalizing it means.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ManagerConfig, ManagerKind};
use crate::connection::{Connection, ConnectionInner, ConnectionStatus, Origin};
use crate::context::RequestContext;
use crate::error::{ConnError, ConnResult};
use crate::statistics::{Statistics, StatisticsSnapshot};
use crate::traits::{Driver, ManageConnections};

mod always_new;
mod bounded_pool;
mod context_singleton;

use always_new::AlwaysNew;
use bounded_pool::BoundedPool;
use context_singleton::ContextSingleton;

/// Issues [`Connection`]s under one lifecycle strategy.
///
/// The strategy comes from [`ManagerConfig::kind`]:
///
/// - **AlwaysNew**: every call opens a fresh connection; release closes it.
///   Nothing is tracked, so the total/free/used gauges stay at zero.
/// - **ContextSingleton**: one connection per [`RequestContext`], reused for
///   the rest of the context and released automatically when it ends.
/// - **BoundedPool**: up to `capacity` connections recycled through a FIFO
///   idle queue; at capacity `get_connection` fails with
///   [`ConnError::PoolExhausted`].
///
/// The manager is cheap to clone (it uses `Arc` internally) and every method
/// is safe to call from several threads at once.
///
/// # Examples
///
/// ```
/// use ferrous_conn::{
///     ConnectionManager, ConnectionStatus, Driver, DriverError, ManagerConfig, ManagerKind,
///     RequestContext,
/// };
///
/// struct Echo;
///
/// impl Driver for Echo {
///     type Config = String;
///     type Instance = String;
///
///     fn create(&self, config: &String) -> Result<String, DriverError> {
///         Ok(format!("connected to {}", config))
///     }
///     fn check(&self, _: &String) -> Result<bool, DriverError> {
///         Ok(true)
///     }
///     fn reconnect(&self, _: &String, _: &String) -> Result<(), DriverError> {
///         Ok(())
///     }
///     fn close(&self, _: &String) -> Result<(), DriverError> {
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<(), ferrous_conn::ConnError> {
/// let config = ManagerConfig::new(ManagerKind::ContextSingleton, vec!["db-1".to_string()])
///     .with_statistics(true);
/// let manager = ConnectionManager::new(Echo, config)?;
///
/// let request = RequestContext::new("GET /users");
/// let first = manager.get_connection(&request)?;
/// let second = manager.get_connection(&request)?;
/// assert!(first.ptr_eq(&second));
/// assert_eq!(*first.instance()?, "connected to db-1");
///
/// request.end();
/// assert_eq!(first.status(), ConnectionStatus::Unavailable);
/// assert_eq!(manager.statistics()?.total_connection_count, 0);
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<D: Driver> {
    inner: Arc<ManagerInner<D>>,
}

pub(crate) struct ManagerInner<D: Driver> {
    driver: D,
    config: ManagerConfig<D::Config>,
    available: AtomicBool,
    statistics: Option<Statistics>,
    cursor: AtomicUsize,
    strategy: Strategy<D>,
}

pub(crate) enum Strategy<D: Driver> {
    AlwaysNew(AlwaysNew),
    ContextSingleton(ContextSingleton<D>),
    BoundedPool(BoundedPool<D>),
}

impl<D: Driver> ConnectionManager<D> {
    /// Builds a manager around `driver`, validating `config` first.
    pub fn new(driver: D, config: ManagerConfig<D::Config>) -> ConnResult<Self> {
        config.validate()?;
        let strategy = match config.kind {
            ManagerKind::AlwaysNew => Strategy::AlwaysNew(AlwaysNew),
            ManagerKind::ContextSingleton => Strategy::ContextSingleton(ContextSingleton::new()),
            ManagerKind::BoundedPool => Strategy::BoundedPool(BoundedPool::new(config.capacity())),
        };
        let statistics = config.enable_statistics.then(Statistics::new);
        tracing::debug!(
            kind = ?config.kind,
            resources = config.resources.len(),
            statistics = config.enable_statistics,
            "connection manager created"
        );
        Ok(Self {
            inner: Arc::new(ManagerInner {
                driver,
                config,
                available: AtomicBool::new(true),
                statistics,
                cursor: AtomicUsize::new(0),
                strategy,
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner<D>>) -> Self {
        Self { inner }
    }

    pub fn kind(&self) -> ManagerKind {
        self.inner.config.kind
    }

    pub fn config(&self) -> &ManagerConfig<D::Config> {
        &self.inner.config
    }

    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    /// False once `close()` has succeeded.
    pub fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    /// Opens a fresh connection that the manager does not track.
    ///
    /// Whatever the strategy, the result is independent of any context cache
    /// or pool: it is closed on release and survives `close()`. Only
    /// `createConnectionTimes` is recorded.
    pub fn create_connection(&self) -> ConnResult<Connection<D>> {
        self.inner.ensure_available()?;
        self.inner.open_untracked()
    }

    /// Acquires a connection according to the manager's strategy.
    ///
    /// `context` scopes the connection for ContextSingleton managers; the other
    /// strategies ignore it.
    pub fn get_connection(&self, context: &RequestContext) -> ConnResult<Connection<D>> {
        let started = Instant::now();
        self.inner.ensure_available()?;
        let connection = match &self.inner.strategy {
            Strategy::AlwaysNew(strategy) => strategy.get(&self.inner)?,
            Strategy::ContextSingleton(strategy) => strategy.get(&self.inner, context)?,
            Strategy::BoundedPool(strategy) => strategy.get(&self.inner)?,
        };
        self.inner.with_stats(|stats| stats.record_get(started.elapsed()));
        tracing::debug!(connection = %connection.id(), kind = ?self.kind(), "connection acquired");
        Ok(connection)
    }

    /// Finalizes a connection its holder already released.
    ///
    /// Only reachable for connections in WaitRelease, i.e. through
    /// [`Connection::release`]; calling it on an Available connection fails
    /// with [`ConnError::ConnectionNotInWaitRelease`].
    pub fn release_connection(&self, connection: &Connection<D>) -> ConnResult<()> {
        if !Arc::ptr_eq(&connection.inner.manager, &self.inner) {
            return Err(ConnError::ForeignConnection);
        }
        self.inner.release_connection(&connection.inner)
    }

    /// Closes the manager.
    ///
    /// New requests fail with [`ConnError::ManagerUnavailable`] afterwards.
    /// Every connection the manager still tracks is finalized; untracked and
    /// detached connections are left alone. A driver failure while closing does
    /// not stop the sweep and is returned once it finishes.
    pub fn close(&self) -> ConnResult<()> {
        if self
            .inner
            .available
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConnError::ManagerAlreadyClosed);
        }
        tracing::info!(kind = ?self.kind(), "closing connection manager");
        match &self.inner.strategy {
            Strategy::AlwaysNew(_) => Ok(()),
            Strategy::ContextSingleton(strategy) => strategy.close(&self.inner),
            Strategy::BoundedPool(strategy) => strategy.close(&self.inner),
        }
    }

    /// Consistent copy of the manager's statistics.
    pub fn statistics(&self) -> ConnResult<StatisticsSnapshot> {
        self.inner
            .statistics
            .as_ref()
            .map(Statistics::snapshot)
            .ok_or(ConnError::StatisticsDisabled)
    }
}

impl<D: Driver> ManagerInner<D> {
    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_available(&self) -> ConnResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ConnError::ManagerUnavailable)
        }
    }

    pub(crate) fn check_state_on_get(&self) -> bool {
        self.config.check_state_when_get_resource
    }

    pub(crate) fn with_stats(&self, f: impl FnOnce(&Statistics)) {
        if let Some(stats) = &self.statistics {
            f(stats);
        }
    }

    /// Round-robin index into the resource list.
    pub(crate) fn next_resource(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.config.resources.len()
    }

    /// Asks the driver for a new instance built from resource `index`.
    pub(crate) fn open_instance(&self, index: usize) -> ConnResult<Arc<D::Instance>> {
        let instance = self
            .driver
            .create(&self.config.resources[index])
            .map_err(ConnError::Driver)?;
        self.with_stats(Statistics::record_create);
        tracing::debug!(resource = index, "driver instance created");
        Ok(Arc::new(instance))
    }

    pub(crate) fn open_untracked(self: &Arc<Self>) -> ConnResult<Connection<D>> {
        let resource = self.next_resource();
        let instance = self.open_instance(resource)?;
        Ok(Connection::new(self.clone(), instance, resource, Origin::Untracked))
    }

    /// Reconnects a reused instance in place when state checks are on and the
    /// driver reports it disconnected.
    pub(crate) fn revive(&self, instance: &D::Instance, index: usize) -> ConnResult<()> {
        if !self.check_state_on_get() {
            return Ok(());
        }
        if self.driver.check(instance).map_err(ConnError::Driver)? {
            return Ok(());
        }
        self.driver
            .reconnect(instance, &self.config.resources[index])
            .map_err(ConnError::Driver)?;
        tracing::debug!(resource = index, "driver instance reconnected");
        Ok(())
    }

    pub(crate) fn close_instance(&self, instance: &D::Instance) -> ConnResult<()> {
        self.driver.close(instance).map_err(ConnError::Driver)
    }

    /// Second phase of release: strategy-specific disposal, then Unavailable.
    pub(crate) fn release_connection(&self, connection: &ConnectionInner<D>) -> ConnResult<()> {
        if connection.status() != ConnectionStatus::WaitRelease {
            return Err(ConnError::ConnectionNotInWaitRelease);
        }
        if let Some((context, key)) = connection.take_teardown() {
            context.cancel(key);
        }

        let result = if connection.is_detached() {
            // Detached connections are the holder's; just dispose the instance
            self.close_instance(&connection.instance)
        } else {
            let result = match (&self.strategy, connection.origin) {
                (Strategy::ContextSingleton(strategy), Origin::Context(context)) => {
                    strategy.finalize(self, context, connection)
                }
                (Strategy::BoundedPool(strategy), Origin::Pooled) => strategy.finalize(self, connection),
                _ => self.close_instance(&connection.instance),
            };
            self.with_stats(Statistics::record_release);
            result
        };

        connection.mark_unavailable();
        tracing::debug!(connection = %connection.id, ok = result.is_ok(), "connection released");
        result
    }

    /// Drops a connection from tracking without touching its instance.
    pub(crate) fn detach_connection(&self, connection: &ConnectionInner<D>) {
        match (&self.strategy, connection.origin) {
            (Strategy::ContextSingleton(strategy), Origin::Context(context)) => {
                strategy.detach(self, context, connection)
            }
            (Strategy::BoundedPool(strategy), Origin::Pooled) => strategy.detach(self, connection),
            _ => {}
        }
        tracing::debug!(connection = %connection.id, "connection detached");
    }

    /// Finalizes tracked connections on behalf of `close()`.
    pub(crate) fn force_release_all<I>(&self, connections: I) -> ConnResult<()>
    where
        I: IntoIterator<Item = Connection<D>>,
    {
        let mut first_error = None;
        for connection in connections {
            if !connection.inner.begin_forced_release() {
                continue;
            }
            if let Err(err) = self.release_connection(&connection.inner) {
                tracing::warn!(connection = %connection.id(), error = %err, "failed to close connection");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<D: Driver> Drop for ManagerInner<D> {
    fn drop(&mut self) {
        // Context caches keep their manager alive, so only pooled idle
        // instances can still be open here
        if let Strategy::BoundedPool(pool) = &self.strategy {
            let this: &Self = self;
            pool.shutdown(this);
        }
    }
}

impl<D: Driver> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<D: Driver> PartialEq for ConnectionManager<D> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: Driver> Eq for ConnectionManager<D> {}

impl<D: Driver> fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("kind", &self.kind())
            .field("available", &self.is_available())
            .field("resources", &self.inner.config.resources.len())
            .field("statistics", &self.inner.statistics.is_some())
            .finish()
    }
}

impl<D: Driver> ManageConnections for ConnectionManager<D> {
    fn kind(&self) -> ManagerKind {
        ConnectionManager::kind(self)
    }

    fn is_available(&self) -> bool {
        ConnectionManager::is_available(self)
    }

    fn close(&self) -> ConnResult<()> {
        ConnectionManager::close(self)
    }

    fn statistics(&self) -> ConnResult<StatisticsSnapshot> {
        ConnectionManager::statistics(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
