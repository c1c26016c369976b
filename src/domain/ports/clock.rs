//! Wall-clock port.
//!
//! Timeout reclamation compares stored timestamps against "now", so the
//! clock is injected; tests drive reclamation deterministically with a
//! manual implementation.

use chrono::{DateTime, Utc};

/// Source of the current UTC wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
