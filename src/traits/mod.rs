//! Core traits for connection managers.

mod driver;
mod manage;

pub use driver::Driver;
pub use manage::ManageConnections;
