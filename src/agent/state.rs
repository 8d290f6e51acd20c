//! Cross-iteration state of one agent and the pure rules that decide how
//! long to wait after each outcome.

use crate::config::AgentConfig;
use crate::error::LlmError;
use crate::training::ExerciseSpec;
use std::fmt;
use std::time::Duration;
use strum::Display;

/// Where the control loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    Rendering,
    Invoking,
    Parsing,
    Validating,
    Dispatching,
    Cooling,
    Paused,
    Stopped,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TransportLost,
    InvocationFailures(u32),
    EmptyReplies(u32),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "stop requested"),
            Self::TransportLost => write!(f, "canvas connection lost"),
            Self::InvocationFailures(n) => write!(f, "{n} consecutive invocation failures"),
            Self::EmptyReplies(n) => write!(f, "{n} consecutive replies without commands"),
        }
    }
}

/// Backoff tier of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited { retry_after: Option<Duration> },
    Timeout,
    Other,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

/// Typed adapter errors decide first; anything foreign is matched on its
/// message.
pub fn classify(err: &anyhow::Error) -> FailureKind {
    if let Some(llm) = err.chain().find_map(|e| e.downcast_ref::<LlmError>()) {
        return match llm {
            LlmError::RateLimited {
                retry_after_secs, ..
            } => FailureKind::RateLimited {
                retry_after: (*retry_after_secs > 0).then(|| Duration::from_secs(*retry_after_secs)),
            },
            LlmError::Timeout { .. } => FailureKind::Timeout,
            LlmError::Request { .. } | LlmError::Auth { .. } | LlmError::EmptyReply { .. } => {
                FailureKind::Other
            }
        };
    }
    let text = format!("{err:#}").to_ascii_lowercase();
    if text.contains("429") || text.contains("rate limit") || text.contains("too many requests") {
        FailureKind::RateLimited { retry_after: None }
    } else if text.contains("timeout") || text.contains("timed out") {
        FailureKind::Timeout
    } else {
        FailureKind::Other
    }
}

/// Waits and budgets applied by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub tiers: Vec<Duration>,
    pub rate_limit_floor: Duration,
    pub timeout: Duration,
    pub empty: Duration,
    pub validation_retry: Duration,
    pub max_failures: u32,
    pub max_empty: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            tiers: config
                .backoff_tiers_secs
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
            rate_limit_floor: Duration::from_secs(config.rate_limit_floor_secs),
            timeout: Duration::from_secs(config.timeout_backoff_secs),
            empty: Duration::from_secs(config.empty_backoff_secs),
            validation_retry: Duration::from_secs(config.validation_retry_secs),
            max_failures: config.max_consecutive_failures.max(1),
            max_empty: config.max_empty_replies.max(1),
        }
    }

    /// Wait after the `consecutive`-th failed invocation in a row.
    pub fn for_failure(&self, kind: FailureKind, consecutive: u32, interval: Duration) -> Duration {
        match kind {
            FailureKind::RateLimited { retry_after } => self
                .rate_limit_floor
                .max(interval)
                .max(retry_after.unwrap_or_default()),
            FailureKind::Timeout => self.timeout,
            FailureKind::Other => {
                let index = usize::try_from(consecutive.saturating_sub(1)).unwrap_or(usize::MAX);
                self.tiers
                    .get(index)
                    .or(self.tiers.last())
                    .copied()
                    .unwrap_or_default()
            }
        }
    }
}

/// Remaining time to the target cadence; zero when the iteration overran.
pub fn cooling(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Everything the loop carries from one iteration to the next.
#[derive(Debug, Clone)]
pub struct AgentRunState {
    pub phase: Phase,
    /// 1-based number of the iteration being worked on.
    pub iteration: u64,
    pub consecutive_failures: u32,
    pub consecutive_empty: u32,
    pub current_backoff: Duration,
    pub last_strategy: Option<String>,
    pub last_intention: Option<String>,
    pub local_description: Option<String>,
    pub global_description: Option<String>,
    pub exercise: Option<&'static ExerciseSpec>,
    pub painted_total: u64,
}

impl AgentRunState {
    pub fn new(exercise: Option<&'static ExerciseSpec>) -> Self {
        Self {
            phase: Phase::Idle,
            iteration: 1,
            consecutive_failures: 0,
            consecutive_empty: 0,
            current_backoff: Duration::ZERO,
            last_strategy: None,
            last_intention: None,
            local_description: None,
            global_description: None,
            exercise,
            painted_total: 0,
        }
    }

    /// Returns the new consecutive failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Returns the new consecutive empty-reply count.
    pub fn record_empty(&mut self) -> u32 {
        self.consecutive_empty += 1;
        self.consecutive_empty
    }

    /// A batch went out: counters reset and the iteration advances.
    pub fn record_success(&mut self, painted: usize) {
        self.consecutive_failures = 0;
        self.consecutive_empty = 0;
        self.current_backoff = Duration::ZERO;
        self.iteration += 1;
        self.painted_total += u64::try_from(painted).unwrap_or(u64::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn other_failures_escalate_through_tiers() {
        let policy = BackoffPolicy::default();
        let waits: Vec<u64> = (1..=5)
            .map(|n| policy.for_failure(FailureKind::Other, n, secs(20)).as_secs())
            .collect();
        assert_eq!(waits, vec![15, 60, 120, 120, 120]);
    }

    #[test]
    fn rate_limit_waits_at_least_a_minute_or_the_cadence() {
        let policy = BackoffPolicy::default();
        let limited = FailureKind::RateLimited { retry_after: None };
        assert_eq!(policy.for_failure(limited, 1, secs(20)), secs(60));
        assert_eq!(policy.for_failure(limited, 1, secs(90)), secs(90));
        let told = FailureKind::RateLimited {
            retry_after: Some(secs(300)),
        };
        assert_eq!(policy.for_failure(told, 1, secs(20)), secs(300));
    }

    #[test]
    fn timeouts_wait_three_minutes() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.for_failure(FailureKind::Timeout, 4, secs(20)), secs(180));
    }

    #[test]
    fn typed_errors_classify_directly() {
        let err = anyhow::Error::new(LlmError::RateLimited {
            adapter: "openai".into(),
            retry_after_secs: 7,
        });
        assert_eq!(
            classify(&err),
            FailureKind::RateLimited {
                retry_after: Some(secs(7))
            }
        );
        let err = anyhow::Error::new(LlmError::Timeout {
            adapter: "ollama".into(),
        });
        assert_eq!(classify(&err), FailureKind::Timeout);
        let err = anyhow::Error::new(LlmError::Auth {
            adapter: "gemini".into(),
        });
        assert_eq!(classify(&err), FailureKind::Other);
    }

    #[test]
    fn foreign_errors_classify_by_message() {
        assert_eq!(
            classify(&anyhow::anyhow!("HTTP 429 Too Many Requests")),
            FailureKind::RateLimited { retry_after: None }
        );
        assert_eq!(
            classify(&anyhow::anyhow!("Timeout after 150 seconds")),
            FailureKind::Timeout
        );
        assert_eq!(classify(&anyhow::anyhow!("socket hang up")), FailureKind::Other);
    }

    #[test]
    fn wrapped_typed_errors_are_found_in_the_chain() {
        let err = anyhow::Error::new(LlmError::Timeout {
            adapter: "anthropic".into(),
        })
        .context("iteration 3");
        assert_eq!(classify(&err), FailureKind::Timeout);
    }

    #[test]
    fn cooling_never_goes_negative() {
        assert_eq!(cooling(secs(20), secs(5)), secs(15));
        assert_eq!(cooling(secs(20), secs(25)), Duration::ZERO);
    }

    #[test]
    fn success_resets_counters_and_advances() {
        let mut state = AgentRunState::new(None);
        assert_eq!(state.record_failure(), 1);
        assert_eq!(state.record_empty(), 1);
        state.record_success(12);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.consecutive_empty, 0);
        assert_eq!(state.iteration, 2);
        assert_eq!(state.painted_total, 12);
    }
}
