//! Control-plane services: the dispatcher core and its collaborators.

pub mod dispatcher;
pub mod failure_reasons;
pub mod recorder;

pub use dispatcher::{
    AckRequest, AgentFilter, CompleteRequest, CreateTaskRequest, DispatchTuning, Dispatcher,
    HeartbeatRequest, ProgressRequest, PullRequest, RegisterAgentRequest, TaskFilter,
};
pub use failure_reasons::{FailureReasonFilter, FailureReasonReport, ReasonBucket};
pub use recorder::Recorder;
