//! Logwarden control plane.
//!
//! Dispatches log-operations work to a pool of pull-based remote agents:
//! - task lifecycle with timeout reclamation and retry budgets
//! - durable SQLite snapshot with sequence recovery
//! - append-only task events and operator audit log
//! - AI log summaries with rule-based degradation

pub mod ai;
pub mod api;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::error::{DomainError, DomainResult};
pub use infrastructure::database::DatabaseConnection;
