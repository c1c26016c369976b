//! Shared test fixtures: in-memory store setup and a manual clock.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use logwarden::domain::ports::{Clock, ControlStore};
use logwarden::infrastructure::database::{DatabaseConnection, SqliteControlStore};
use logwarden::services::{DispatchTuning, Dispatcher};

/// Open a fresh in-memory database with migrations applied.
pub async fn setup_store() -> (DatabaseConnection, Arc<SqliteControlStore>) {
    let db = DatabaseConnection::new("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    db.migrate().await.expect("failed to run migrations");
    let store = Arc::new(SqliteControlStore::new(db.pool().clone()));
    (db, store)
}

/// A clock tests can advance by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock poisoned")
    }
}

/// Dispatcher wired to a fresh store and a manual clock.
pub async fn setup_dispatcher(
) -> (DatabaseConnection, Arc<SqliteControlStore>, Arc<ManualClock>, Dispatcher) {
    let (db, store) = setup_store().await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let dispatcher = Dispatcher::load(
        store.clone() as Arc<dyn ControlStore>,
        clock.clone() as Arc<dyn Clock>,
        DispatchTuning::default(),
    )
    .await
    .expect("failed to load dispatcher");
    (db, store, clock, dispatcher)
}
