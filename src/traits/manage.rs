//! Type-erased manager contract used by the registry.

use std::any::Any;

use crate::config::ManagerKind;
use crate::error::ConnResult;
use crate::statistics::StatisticsSnapshot;

/// Driver-independent view of a connection manager.
///
/// [`ConnectionManager`](crate::ConnectionManager) is generic over its driver,
/// so the [`ConnectionCenter`](crate::ConnectionCenter) stores managers behind
/// this object-safe trait and recovers the concrete type through
/// [`as_any`](Self::as_any) when a caller asks for it.
pub trait ManageConnections: Send + Sync + 'static {
    /// The strategy this manager runs.
    fn kind(&self) -> ManagerKind;

    /// False once `close()` has succeeded.
    fn is_available(&self) -> bool;

    /// Closes the manager and every connection it still tracks.
    fn close(&self) -> ConnResult<()>;

    /// Consistent copy of the manager's statistics.
    fn statistics(&self) -> ConnResult<StatisticsSnapshot>;

    /// Downcast hook for typed lookups.
    fn as_any(&self) -> &dyn Any;
}
