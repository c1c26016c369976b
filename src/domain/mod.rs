//! Domain layer: core models, error kinds, and ports.

pub mod error;
pub mod ids;
pub mod models;
pub mod ports;

pub use error::{DomainError, DomainResult};
