//! Driver capability consumed by connection managers.

use crate::error::DriverError;

/// Opens, checks and closes raw resource instances.
///
/// A driver knows nothing about lifecycles, pooling or statistics; managers
/// call it and wrap what it returns in a [`Connection`](crate::Connection).
///
/// Instances are shared behind an `Arc` (callers hold one through
/// [`Connection::instance`](crate::Connection::instance) while the manager
/// keeps another), so every method takes `&Self::Instance`. Instances that need
/// to change state on reconnect or close use interior mutability, the same way
/// most client handles already do.
///
/// # Examples
///
/// ```
/// use ferrous_conn::{Driver, DriverError};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Socket {
///     addr: String,
///     open: AtomicBool,
/// }
///
/// struct SocketDriver;
///
/// impl Driver for SocketDriver {
///     type Config = String;
///     type Instance = Socket;
///
///     fn create(&self, addr: &String) -> Result<Socket, DriverError> {
///         Ok(Socket { addr: addr.clone(), open: AtomicBool::new(true) })
///     }
///
///     fn check(&self, socket: &Socket) -> Result<bool, DriverError> {
///         Ok(socket.open.load(Ordering::SeqCst))
///     }
///
///     fn reconnect(&self, socket: &Socket, _addr: &String) -> Result<(), DriverError> {
///         socket.open.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn close(&self, socket: &Socket) -> Result<(), DriverError> {
///         socket.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let driver = SocketDriver;
/// let socket = driver.create(&"127.0.0.1:6379".to_string()).unwrap();
/// assert_eq!(socket.addr, "127.0.0.1:6379");
/// assert!(driver.check(&socket).unwrap());
/// ```
pub trait Driver: Send + Sync + 'static {
    /// One entry of the manager's resource list.
    type Config: Send + Sync + 'static;
    /// The raw resource handed out through connections.
    type Instance: Send + Sync + 'static;

    /// Opens a new instance from a resource configuration entry.
    fn create(&self, config: &Self::Config) -> Result<Self::Instance, DriverError>;

    /// Reports whether the instance is still connected.
    fn check(&self, instance: &Self::Instance) -> Result<bool, DriverError>;

    /// Re-establishes a disconnected instance in place.
    fn reconnect(&self, instance: &Self::Instance, config: &Self::Config) -> Result<(), DriverError>;

    /// Closes the instance.
    fn close(&self, instance: &Self::Instance) -> Result<(), DriverError>;
}
