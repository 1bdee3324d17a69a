//! Internal teardown bag for request-context callbacks.

use crate::context::TeardownKey;

type TeardownFn = Box<dyn FnOnce() + Send>;

/// Keyed teardown callbacks with LIFO execution order.
///
/// Callbacks can be cancelled individually by key until the bag is drained.
/// Draining hands the callbacks to the caller so they run without the owning
/// lock held.
#[derive(Default)]
pub(crate) struct TeardownBag {
    hooks: Vec<(TeardownKey, TeardownFn)>,
}

impl TeardownBag {
    /// Add a callback under `key`.
    pub(crate) fn push(&mut self, key: TeardownKey, f: TeardownFn) {
        self.hooks.push((key, f));
    }

    /// Remove a pending callback. Returns false if it already ran or never existed.
    pub(crate) fn cancel(&mut self, key: TeardownKey) -> bool {
        match self.hooks.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                drop(self.hooks.remove(index));
                true
            }
            None => false,
        }
    }

    /// Take every pending callback, most recently registered first.
    pub(crate) fn drain_reverse(&mut self) -> Vec<TeardownFn> {
        self.hooks.drain(..).rev().map(|(_, f)| f).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<u64>>>, value: u64) -> TeardownFn {
        let log = log.clone();
        Box::new(move || log.lock().unwrap().push(value))
    }

    #[test]
    fn test_drain_runs_lifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = TeardownBag::default();
        bag.push(TeardownKey(1), recorder(&log, 1));
        bag.push(TeardownKey(2), recorder(&log, 2));
        bag.push(TeardownKey(3), recorder(&log, 3));

        for f in bag.drain_reverse() {
            f();
        }

        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
        assert_eq!(bag.len(), 0);
    }

    #[test]
    fn test_cancel_removes_single_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = TeardownBag::default();
        bag.push(TeardownKey(1), recorder(&log, 1));
        bag.push(TeardownKey(2), recorder(&log, 2));

        assert!(bag.cancel(TeardownKey(1)));
        assert!(!bag.cancel(TeardownKey(1)));
        assert_eq!(bag.len(), 1);

        for f in bag.drain_reverse() {
            f();
        }
        assert_eq!(*log.lock().unwrap(), vec![2]);
    }
}
