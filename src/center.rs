//! Process-wide registry of named connection managers.
//!
//! The application owns one [`ConnectionCenter`], registers its managers at
//! startup and calls [`close_all_connection_managers`] from its shutdown path.
//!
//! [`close_all_connection_managers`]: ConnectionCenter::close_all_connection_managers

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ConnError, ConnResult};
use crate::manager::ConnectionManager;
use crate::statistics::StatisticsSnapshot;
use crate::traits::{Driver, ManageConnections};

/// Named managers, possibly over different drivers.
///
/// # Examples
///
/// ```
/// use ferrous_conn::{
///     ConnectionCenter, ConnectionManager, Driver, DriverError, ManagerConfig, ManagerKind,
/// };
///
/// struct Noop;
///
/// impl Driver for Noop {
///     type Config = ();
///     type Instance = ();
///
///     fn create(&self, _: &()) -> Result<(), DriverError> { Ok(()) }
///     fn check(&self, _: &()) -> Result<bool, DriverError> { Ok(true) }
///     fn reconnect(&self, _: &(), _: &()) -> Result<(), DriverError> { Ok(()) }
///     fn close(&self, _: &()) -> Result<(), DriverError> { Ok(()) }
/// }
///
/// # fn main() -> Result<(), ferrous_conn::ConnError> {
/// let center = ConnectionCenter::new();
/// let manager = ConnectionManager::new(Noop, ManagerConfig::new(ManagerKind::AlwaysNew, vec![()]))?;
/// center.add_connection_manager("cache", manager)?;
///
/// let typed = center.get_typed::<Noop>("cache").unwrap();
/// assert!(typed.is_available());
///
/// assert!(center.close_all_connection_managers().is_empty());
/// assert!(!typed.is_available());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConnectionCenter {
    managers: RwLock<HashMap<String, Arc<dyn ManageConnections>>>,
}

impl ConnectionCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `manager` under `name`.
    ///
    /// Fails with [`ConnError::DuplicateManager`] if the name is taken; the
    /// existing manager is left untouched.
    pub fn add_connection_manager<M>(&self, name: impl Into<String>, manager: M) -> ConnResult<()>
    where
        M: ManageConnections,
    {
        let name = name.into();
        let mut managers = self.managers.write();
        if managers.contains_key(&name) {
            return Err(ConnError::DuplicateManager(name));
        }
        tracing::debug!(manager = %name, kind = ?manager.kind(), "connection manager registered");
        managers.insert(name, Arc::new(manager));
        Ok(())
    }

    pub fn get_connection_manager(&self, name: &str) -> Option<Arc<dyn ManageConnections>> {
        self.managers.read().get(name).cloned()
    }

    /// Looks up a manager and recovers its concrete driver type.
    ///
    /// Returns `None` if nothing is registered under `name` or it runs a
    /// different driver.
    pub fn get_typed<D: Driver>(&self, name: &str) -> Option<ConnectionManager<D>> {
        let manager = self.get_connection_manager(name)?;
        manager.as_any().downcast_ref::<ConnectionManager<D>>().cloned()
    }

    pub fn has_connection_manager(&self, name: &str) -> bool {
        self.managers.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.read().is_empty()
    }

    /// Unregisters and closes a manager.
    ///
    /// Returns `Ok(false)` if nothing was registered under `name`. A manager
    /// that was already closed is removed without error.
    pub fn remove_connection_manager(&self, name: &str) -> ConnResult<bool> {
        let Some(manager) = self.managers.write().remove(name) else {
            return Ok(false);
        };
        match manager.close() {
            Ok(()) => Ok(true),
            Err(err) if err.is_closed() => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Statistics of every manager that keeps them, sorted by name.
    pub fn statistics_all(&self) -> Vec<(String, StatisticsSnapshot)> {
        let mut all: Vec<(String, StatisticsSnapshot)> = self
            .managers
            .read()
            .iter()
            .filter_map(|(name, manager)| manager.statistics().ok().map(|s| (name.clone(), s)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Closes every registered manager, typically at process shutdown.
    ///
    /// Managers stay registered. Already-closed managers are skipped
    /// silently; any other failure is logged and returned with the manager's
    /// name once every manager has been visited.
    pub fn close_all_connection_managers(&self) -> Vec<(String, ConnError)> {
        // Closing can call into drivers, so work on a copy outside the lock
        let managers: Vec<(String, Arc<dyn ManageConnections>)> = self
            .managers
            .read()
            .iter()
            .map(|(name, manager)| (name.clone(), manager.clone()))
            .collect();
        tracing::info!(managers = managers.len(), "closing all connection managers");

        let mut failures = Vec::new();
        for (name, manager) in managers {
            match manager.close() {
                Ok(()) => {}
                Err(err) if err.is_closed() => {
                    tracing::debug!(manager = %name, "connection manager already closed");
                }
                Err(err) => {
                    tracing::warn!(manager = %name, error = %err, "failed to close connection manager");
                    failures.push((name, err));
                }
            }
        }
        failures
    }
}

impl fmt::Debug for ConnectionCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCenter")
            .field("managers", &self.names())
            .finish()
    }
}
