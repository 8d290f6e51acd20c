//! The per-agent control loop and its run state.

pub mod control;
pub mod loop_;
pub mod state;

pub use control::AgentHandle;
pub use loop_::{AgentDeps, IterationLoop, LoopSettings, RunSummary};
pub use state::{
    AgentRunState, BackoffPolicy, FailureKind, Phase, StopReason, classify, cooling,
};
