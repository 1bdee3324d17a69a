//! # ferrous-conn
//!
//! Connection lifecycle management for Rust: a uniform way to acquire,
//! reuse, release and close connections to external resources (databases,
//! caches, message brokers) over any driver you plug in.
//!
//! ## Features
//!
//! - **Explicit state machine**: connections move Available → WaitRelease → Unavailable, never back
//! - **Three strategies**: always-new, one-per-request-context, and a bounded pool
//! - **Request contexts**: connections scoped to a context are released when it ends
//! - **Statistics**: per-manager counters, gauges and acquisition timings, exportable as JSON or Prometheus text
//! - **Registry**: named managers closed together at shutdown
//! - **Thread-safe**: every operation may run concurrently from threads or async tasks
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_conn::{
//!     ConnectionManager, Driver, DriverError, ManagerConfig, ManagerKind, RequestContext,
//! };
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! // A driver knows how to open and close one kind of resource
//! struct Client {
//!     url: String,
//!     open: AtomicBool,
//! }
//!
//! struct ClientDriver;
//!
//! impl Driver for ClientDriver {
//!     type Config = String;
//!     type Instance = Client;
//!
//!     fn create(&self, url: &String) -> Result<Client, DriverError> {
//!         Ok(Client { url: url.clone(), open: AtomicBool::new(true) })
//!     }
//!     fn check(&self, client: &Client) -> Result<bool, DriverError> {
//!         Ok(client.open.load(Ordering::SeqCst))
//!     }
//!     fn reconnect(&self, client: &Client, _: &String) -> Result<(), DriverError> {
//!         client.open.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//!     fn close(&self, client: &Client) -> Result<(), DriverError> {
//!         client.open.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), ferrous_conn::ConnError> {
//! let config = ManagerConfig::new(ManagerKind::AlwaysNew, vec!["redis://cache".to_string()])
//!     .with_statistics(true);
//! let manager = ConnectionManager::new(ClientDriver, config)?;
//!
//! let conn = manager.get_connection(&RequestContext::new("job"))?;
//! assert_eq!(conn.instance()?.url, "redis://cache");
//! conn.release()?;
//!
//! let stats = manager.statistics()?;
//! assert_eq!(stats.create_connection_times, 1);
//! assert_eq!(stats.release_connection_times, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Strategies
//!
//! - **AlwaysNew**: a fresh connection per call, closed on release
//! - **ContextSingleton**: one connection per [`RequestContext`], released when the context ends
//! - **BoundedPool**: up to N connections recycled FIFO; fails fast with
//!   [`ConnError::PoolExhausted`] when all are checked out
//!
//! ## Shutdown
//!
//! ```rust
//! use ferrous_conn::ConnectionCenter;
//!
//! let center = ConnectionCenter::new();
//! // ... register managers at startup ...
//! for (name, err) in center.close_all_connection_managers() {
//!     eprintln!("failed to close {}: {}", name, err);
//! }
//! ```

pub mod center;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod manager;
pub mod statistics;
pub mod traits;

mod internal;

pub use center::ConnectionCenter;
pub use config::{ManagerConfig, ManagerKind};
pub use connection::{Connection, ConnectionId, ConnectionStatus};
pub use context::{ContextId, RequestContext, TeardownKey};
pub use error::{ConnError, ConnResult, DriverError};
pub use manager::ConnectionManager;
pub use statistics::StatisticsSnapshot;
pub use traits::{Driver, ManageConnections};
