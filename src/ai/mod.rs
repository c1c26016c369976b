//! AI log-summary engine.
//!
//! Validates a log path against the configured allow-list, samples the
//! file (tail or keyword search), compresses it to a line budget, asks a
//! chat-completions model for a structured summary, and degrades to a
//! rule-based result whenever the model path fails.

pub mod classify;
pub mod client;
pub mod compress;
pub mod fallback;
pub mod paths;
pub mod sampler;
pub mod summarizer;
pub mod types;

pub use summarizer::Summarizer;
pub use types::{LogSummary, Severity, SummaryEnvelope, SummaryMeta, SummaryRequest};
