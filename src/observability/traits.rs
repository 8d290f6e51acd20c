use std::time::Duration;

/// Lifecycle events of one painting agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    AgentStart {
        adapter: String,
        model: String,
        position: Option<String>,
    },
    IterationSucceeded {
        iteration: u64,
        commands: usize,
        strategy: Option<String>,
    },
    IterationFailed {
        iteration: u64,
        reason: String,
        backoff: Duration,
    },
    ValidationRejected {
        exercise: String,
    },
    ExerciseAdvanced {
        from: String,
        to: String,
    },
    AgentStopped {
        reason: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverMetric {
    InvocationLatency(Duration),
    TokensUsed(u64),
    CommandsDispatched(u64),
}

/// Sink for agent telemetry. Recording never fails.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data (no-op for most backends)
    fn flush(&self) {}

    fn name(&self) -> &str;
}
