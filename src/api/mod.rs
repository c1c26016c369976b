//! HTTP surface.
//!
//! JSON in, JSON out, everything under `/api`. Handlers borrow the
//! dispatcher for the duration of a request and never hold its lock
//! across model calls or disk reads; the AI pipeline owns no dispatcher
//! state at all.

pub mod ai;
pub mod control;
pub mod error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::Summarizer;
use crate::services::Dispatcher;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub summarizer: Arc<Summarizer>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(control::healthz))
        .route(
            "/api/control/agents",
            post(control::register_agent).get(control::list_agents),
        )
        .route("/api/control/agents/:id", get(control::get_agent))
        .route("/api/control/agents/:id/heartbeat", post(control::heartbeat))
        .route("/api/control/agents/:id/drain", post(control::drain_agent))
        .route(
            "/api/control/tasks",
            post(control::create_task).get(control::list_tasks),
        )
        .route(
            "/api/control/tasks/failure-reasons",
            get(control::failure_reasons),
        )
        .route("/api/control/tasks/:id", get(control::get_task))
        .route("/api/control/tasks/:id/cancel", post(control::cancel_task))
        .route("/api/control/tasks/:id/retry", post(control::retry_task))
        .route("/api/control/tasks/:id/events", get(control::task_events))
        .route("/api/control/tasks/:id/ack", post(control::ack_task))
        .route("/api/control/tasks/:id/progress", post(control::progress_task))
        .route("/api/control/tasks/:id/complete", post(control::complete_task))
        .route("/api/control/dispatch/pull", post(control::pull))
        .route("/api/control/audit", get(control::audit_logs))
        .route("/api/ai/log-summary", post(ai::log_summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
