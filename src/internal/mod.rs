//! Internal implementation details.

pub(crate) mod teardown_bag;

pub(crate) use teardown_bag::TeardownBag;
