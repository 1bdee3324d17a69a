/// Property-based tests for manager statistics
///
/// Random sequences of acquire/release/detach/drop/end operations must keep
/// the counters monotonic and the gauges consistent with what is tracked.

mod common;

use common::{config, manager_with};
use ferrous_conn::{Connection, ConnectionStatus, ManagerKind, RequestContext, StatisticsSnapshot};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Get(usize),
    Create,
    Release(usize),
    Detach(usize),
    Drop(usize),
    EndContext(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize).prop_map(Op::Get),
        Just(Op::Create),
        (0..8usize).prop_map(Op::Release),
        (0..8usize).prop_map(Op::Detach),
        (0..8usize).prop_map(Op::Drop),
        (0..3usize).prop_map(Op::EndContext),
    ]
}

fn kind_strategy() -> impl Strategy<Value = ManagerKind> {
    prop_oneof![
        Just(ManagerKind::AlwaysNew),
        Just(ManagerKind::ContextSingleton),
        Just(ManagerKind::BoundedPool),
    ]
}

fn assert_monotonic(before: &StatisticsSnapshot, after: &StatisticsSnapshot) -> Result<(), TestCaseError> {
    prop_assert!(after.create_connection_times >= before.create_connection_times);
    prop_assert!(after.get_connection_times >= before.get_connection_times);
    prop_assert!(after.release_connection_times >= before.release_connection_times);
    // Extremes only widen
    prop_assert!(after.min_get_connection_time <= before.min_get_connection_time);
    prop_assert!(after.max_get_connection_time >= before.max_get_connection_time);
    Ok(())
}

/// Drives one random workload and checks statistics after every step.
fn run(kind: ManagerKind, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let (manager, _) = manager_with(config(kind).with_max_connections(4));
    let mut contexts: Vec<RequestContext> = (0..3).map(|i| RequestContext::new(format!("ctx-{}", i))).collect();
    let mut held: Vec<Connection<common::TestDriver>> = Vec::new();
    let mut previous = manager.statistics().unwrap();

    for op in ops {
        match op {
            Op::Get(c) => {
                if let Ok(connection) = manager.get_connection(&contexts[c]) {
                    held.push(connection);
                }
            }
            Op::Create => held.push(manager.create_connection().unwrap()),
            Op::Release(i) if !held.is_empty() => {
                let connection = &held[i % held.len()];
                let _ = connection.release();
                prop_assert!(connection.status() != ConnectionStatus::Available);
            }
            Op::Detach(i) if !held.is_empty() => {
                let connection = &held[i % held.len()];
                let _ = connection.detach();
            }
            Op::Drop(i) if !held.is_empty() => {
                let index = i % held.len();
                held.swap_remove(index);
            }
            Op::EndContext(c) => {
                contexts[c].end();
                contexts[c] = RequestContext::new(format!("ctx-{}-next", c));
            }
            _ => {}
        }

        let current = manager.statistics().unwrap();
        assert_monotonic(&previous, &current)?;
        match kind {
            ManagerKind::AlwaysNew => {
                prop_assert_eq!(current.total_connection_count, 0);
                prop_assert_eq!(current.free_connection_count, 0);
                prop_assert_eq!(current.used_connection_count, 0);
            }
            ManagerKind::ContextSingleton => {
                prop_assert_eq!(current.free_connection_count, 0);
                prop_assert_eq!(current.total_connection_count, current.used_connection_count);
                prop_assert!(current.total_connection_count <= 3);
            }
            ManagerKind::BoundedPool => {
                prop_assert_eq!(
                    current.total_connection_count,
                    current.free_connection_count + current.used_connection_count
                );
                prop_assert!(current.total_connection_count <= 4);
            }
        }
        if current.get_connection_times > 0 {
            prop_assert!(current.min_get_connection_time <= current.max_get_connection_time);
        }
        previous = current;
    }

    manager.close().unwrap();
    for connection in &held {
        if !connection.is_detached() {
            prop_assert!(connection.status() != ConnectionStatus::Available || connection.context_id().is_none());
        }
    }
    if kind != ManagerKind::AlwaysNew {
        let stats = manager.statistics().unwrap();
        prop_assert_eq!(stats.used_connection_count, 0);
        prop_assert_eq!(stats.free_connection_count, 0);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn statistics_stay_consistent(kind in kind_strategy(), ops in prop::collection::vec(op_strategy(), 1..60)) {
        run(kind, ops)?;
    }
}

proptest! {
    #[test]
    fn get_times_count_successes(gets in 1usize..40) {
        let (manager, _) = manager_with(config(ManagerKind::ContextSingleton));
        let ctx = RequestContext::new("request");
        for _ in 0..gets {
            manager.get_connection(&ctx).unwrap();
        }
        let stats = manager.statistics().unwrap();
        prop_assert_eq!(stats.get_connection_times, gets as u64);
        prop_assert_eq!(stats.create_connection_times, 1);
        prop_assert_eq!(stats.total_connection_count, 1);
    }
}
