//! Shared test driver for the integration tests.
//!
//! `TestDriver` mimics a network client: instances start connected, `check`
//! counts how often it was asked and reports the `connected` flag, and
//! `close` disconnects. Every call is counted so tests can see exactly what
//! the manager did.

#![allow(dead_code)]

use ferrous_conn::{ConnectionManager, Driver, DriverError, ManagerConfig, ManagerKind};
use serde::Deserialize;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestConfig {
    pub test: bool,
}

impl TestConfig {
    pub fn new() -> Self {
        Self { test: true }
    }
}

#[derive(Debug)]
pub struct TestInstance {
    pub config: TestConfig,
    pub connected: AtomicBool,
    /// Number of health checks run against this instance
    pub available: AtomicU32,
}

impl TestInstance {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> u32 {
        self.available.load(Ordering::SeqCst)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct DriverCounters {
    pub created: AtomicUsize,
    pub checked: AtomicUsize,
    pub reconnected: AtomicUsize,
    pub closed: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_close: AtomicBool,
}

impl DriverCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn reconnected(&self) -> usize {
        self.reconnected.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestDriver {
    pub counters: Arc<DriverCounters>,
}

impl TestDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for TestDriver {
    type Config = TestConfig;
    type Instance = TestInstance;

    fn create(&self, config: &TestConfig) -> Result<TestInstance, DriverError> {
        if self.counters.fail_create.load(Ordering::SeqCst) {
            return Err(Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(TestInstance {
            config: config.clone(),
            connected: AtomicBool::new(true),
            available: AtomicU32::new(0),
        })
    }

    fn check(&self, instance: &TestInstance) -> Result<bool, DriverError> {
        self.counters.checked.fetch_add(1, Ordering::SeqCst);
        instance.available.fetch_add(1, Ordering::SeqCst);
        Ok(instance.is_connected())
    }

    fn reconnect(&self, instance: &TestInstance, _config: &TestConfig) -> Result<(), DriverError> {
        self.counters.reconnected.fetch_add(1, Ordering::SeqCst);
        instance.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self, instance: &TestInstance) -> Result<(), DriverError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        instance.disconnect();
        if self.counters.fail_close.load(Ordering::SeqCst) {
            return Err(Box::new(io::Error::new(io::ErrorKind::BrokenPipe, "close failed")));
        }
        Ok(())
    }
}

pub fn config(kind: ManagerKind) -> ManagerConfig<TestConfig> {
    ManagerConfig::new(kind, vec![TestConfig::new()]).with_statistics(true)
}

/// Manager with statistics on and one resource entry, plus its driver counters.
pub fn manager(kind: ManagerKind) -> (ConnectionManager<TestDriver>, Arc<DriverCounters>) {
    manager_with(config(kind))
}

pub fn manager_with(config: ManagerConfig<TestConfig>) -> (ConnectionManager<TestDriver>, Arc<DriverCounters>) {
    let driver = TestDriver::new();
    let counters = driver.counters.clone();
    let manager = ConnectionManager::new(driver, config).expect("valid test configuration");
    (manager, counters)
}

/// Routes library logs to the test output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
