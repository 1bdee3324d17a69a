/// Always-new manager tests
///
/// Every acquisition opens a fresh driver instance and every release closes
/// it; nothing is tracked, so the connection gauges never move.

mod common;

use common::{config, manager, manager_with, TestConfig};
use ferrous_conn::{ConnError, ConnectionStatus, ManagerConfig, ManagerKind, RequestContext};
use std::sync::atomic::Ordering;

#[test]
fn test_get_connection() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let ctx = RequestContext::new("request");

    let connection = manager.get_connection(&ctx).unwrap();
    assert_eq!(connection.status(), ConnectionStatus::Available);
    assert_eq!(connection.manager(), manager);
    assert_eq!(connection.context_id(), None);
    let instance = connection.instance().unwrap();
    assert!(instance.config.test);
    assert!(instance.is_connected());

    // Same context, still a new connection
    let other = manager.get_connection(&ctx).unwrap();
    assert!(!connection.ptr_eq(&other));
    assert_ne!(connection.id(), other.id());
    assert_eq!(counters.created(), 2);
}

#[test]
fn test_release_connection() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let connection = manager.get_connection(&RequestContext::new("request")).unwrap();
    let instance = connection.instance().unwrap();

    connection.release().unwrap();

    assert_eq!(connection.status(), ConnectionStatus::Unavailable);
    assert!(!instance.is_connected());
    assert_eq!(counters.closed(), 1);
}

#[test]
fn test_release_connection_requires_wait_release() {
    let (manager, _) = manager(ManagerKind::AlwaysNew);
    let connection = manager.create_connection().unwrap();

    assert!(matches!(
        manager.release_connection(&connection),
        Err(ConnError::ConnectionNotInWaitRelease)
    ));
}

#[test]
fn test_get_instance_after_release() {
    let (manager, _) = manager(ManagerKind::AlwaysNew);
    let connection = manager.create_connection().unwrap();
    connection.release().unwrap();

    let err = connection.instance().unwrap_err();
    assert!(matches!(err, ConnError::ConnectionNotAvailable));
    assert_eq!(err.to_string(), "Connection is not available");
}

#[test]
fn test_release_after_release() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let connection = manager.create_connection().unwrap();
    connection.release().unwrap();

    assert!(matches!(connection.release(), Err(ConnError::ConnectionNotAvailable)));
    assert_eq!(counters.closed(), 1);
    assert_eq!(manager.statistics().unwrap().release_connection_times, 1);
}

#[test]
fn test_detach_after_release() {
    let (manager, _) = manager(ManagerKind::AlwaysNew);
    let connection = manager.create_connection().unwrap();
    connection.release().unwrap();

    assert!(matches!(connection.detach(), Err(ConnError::ConnectionNotAvailable)));
    assert!(!connection.is_detached());
}

#[test]
fn test_detach() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let connection = manager.get_connection(&RequestContext::new("request")).unwrap();

    connection.detach().unwrap();
    assert!(connection.is_detached());
    assert_eq!(connection.status(), ConnectionStatus::Available);

    manager.close().unwrap();
    assert_eq!(connection.status(), ConnectionStatus::Available);
    assert!(connection.instance().unwrap().is_connected());

    // Releasing a detached connection still closes the instance, off the books
    connection.release().unwrap();
    assert_eq!(connection.status(), ConnectionStatus::Unavailable);
    assert_eq!(counters.closed(), 1);
    assert_eq!(manager.statistics().unwrap().release_connection_times, 0);
}

#[test]
fn test_statistics_never_track_totals() {
    let (manager, _) = manager(ManagerKind::AlwaysNew);

    let connection = manager.create_connection().unwrap();
    let stats = manager.statistics().unwrap();
    assert_eq!(stats.create_connection_times, 1);
    assert_eq!(stats.get_connection_times, 0);
    assert_eq!(stats.max_get_connection_time, 0.0);
    assert_eq!(stats.min_get_connection_time, f64::MAX);

    drop(connection);
    let stats = manager.statistics().unwrap();
    assert_eq!(stats.release_connection_times, 1);

    let ctx = RequestContext::new("request");
    let connection = manager.get_connection(&ctx).unwrap();
    let stats = manager.statistics().unwrap();
    assert_eq!(stats.create_connection_times, 2);
    assert_eq!(stats.get_connection_times, 1);
    assert_eq!(stats.total_connection_count, 0);
    assert_eq!(stats.free_connection_count, 0);
    assert_eq!(stats.used_connection_count, 0);
    assert!(stats.min_get_connection_time < f64::MAX);

    connection.release().unwrap();
    let stats = manager.statistics().unwrap();
    assert_eq!(stats.release_connection_times, 2);
    assert_eq!(stats.total_connection_count, 0);
}

#[test]
fn test_close() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let ctx = RequestContext::new("request");
    let connection = manager.get_connection(&ctx).unwrap();

    manager.close().unwrap();
    assert!(!manager.is_available());

    // Nothing is tracked, so issued connections are left alone
    assert_eq!(connection.status(), ConnectionStatus::Available);
    assert_eq!(counters.closed(), 0);

    assert!(matches!(manager.create_connection(), Err(ConnError::ManagerUnavailable)));
    assert!(matches!(manager.get_connection(&ctx), Err(ConnError::ManagerUnavailable)));

    connection.release().unwrap();
    assert_eq!(counters.closed(), 1);
}

#[test]
fn test_close_twice_fails() {
    let (manager, _) = manager(ManagerKind::AlwaysNew);
    manager.close().unwrap();

    let err = manager.close().unwrap_err();
    assert!(err.is_closed());
    assert_eq!(err.to_string(), "Connection manager is already closed");
}

#[test]
fn test_driver_failure_propagates() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    counters.fail_create.store(true, Ordering::SeqCst);

    let err = manager.get_connection(&RequestContext::new("request")).unwrap_err();
    assert!(matches!(err, ConnError::Driver(_)));
    assert!(err.to_string().contains("connection refused"));

    // Failed acquisitions are not counted
    let stats = manager.statistics().unwrap();
    assert_eq!(stats.create_connection_times, 0);
    assert_eq!(stats.get_connection_times, 0);
}

#[test]
fn test_close_failure_still_finalizes() {
    let (manager, counters) = manager(ManagerKind::AlwaysNew);
    let connection = manager.create_connection().unwrap();
    counters.fail_close.store(true, Ordering::SeqCst);

    assert!(matches!(connection.release(), Err(ConnError::Driver(_))));
    assert_eq!(connection.status(), ConnectionStatus::Unavailable);
    assert_eq!(manager.statistics().unwrap().release_connection_times, 1);
}

#[test]
fn test_round_robin_resources() {
    let resources = vec![TestConfig { test: true }, TestConfig { test: false }];
    let (manager, _) = manager_with(ManagerConfig::new(ManagerKind::AlwaysNew, resources));

    let picks: Vec<bool> = (0..4)
        .map(|_| manager.create_connection().unwrap().instance().unwrap().config.test)
        .collect();
    assert_eq!(picks, vec![true, false, true, false]);
}

#[test]
fn test_from_json_config() {
    let config = ManagerConfig::<TestConfig>::from_json(
        r#"{"kind":"alwaysNew","resources":[{"test":true}],"enableStatistics":true}"#,
    )
    .unwrap();
    let (manager, _) = manager_with(config);

    assert_eq!(manager.kind(), ManagerKind::AlwaysNew);
    assert!(manager.config().enable_statistics);
    assert!(manager.statistics().is_ok());
}

#[test]
fn test_statistics_disabled_by_default() {
    let (manager, _) = manager_with(config(ManagerKind::AlwaysNew).with_statistics(false));
    assert!(matches!(manager.statistics(), Err(ConnError::StatisticsDisabled)));
}
