//! SQLite persistence for control-plane state.

pub mod connection;
pub mod control_store;
pub mod utils;

pub use connection::DatabaseConnection;
pub use control_store::SqliteControlStore;
