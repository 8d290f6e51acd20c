use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::info;

/// Writes every event and metric through `tracing`.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::AgentStart {
                adapter,
                model,
                position,
            } => {
                info!(adapter = %adapter, model = %model, position = ?position, "agent.start");
            }
            ObserverEvent::IterationSucceeded {
                iteration,
                commands,
                strategy,
            } => {
                info!(iteration, commands, strategy = ?strategy, "iteration.succeeded");
            }
            ObserverEvent::IterationFailed {
                iteration,
                reason,
                backoff,
            } => {
                info!(iteration, reason = %reason, backoff_ms = millis(*backoff), "iteration.failed");
            }
            ObserverEvent::ValidationRejected { exercise } => {
                info!(exercise = %exercise, "exercise.rejected");
            }
            ObserverEvent::ExerciseAdvanced { from, to } => {
                info!(from = %from, to = %to, "exercise.advanced");
            }
            ObserverEvent::AgentStopped { reason } => {
                info!(reason = %reason, "agent.stopped");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::InvocationLatency(d) => {
                info!(latency_ms = millis(*d), "metric.invocation_latency");
            }
            ObserverMetric::TokensUsed(t) => {
                info!(tokens = t, "metric.tokens_used");
            }
            ObserverMetric::CommandsDispatched(n) => {
                info!(commands = n, "metric.commands_dispatched");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
