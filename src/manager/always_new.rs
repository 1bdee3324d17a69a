use std::sync::Arc;

use super::ManagerInner;
use crate::connection::Connection;
use crate::error::ConnResult;
use crate::traits::Driver;

/// Opens a fresh connection on every request.
///
/// Nothing is cached, so there is nothing to finalize beyond closing the
/// instance and nothing to sweep on close.
pub(crate) struct AlwaysNew;

impl AlwaysNew {
    pub(crate) fn get<D: Driver>(&self, manager: &Arc<ManagerInner<D>>) -> ConnResult<Connection<D>> {
        manager.open_untracked()
    }
}
