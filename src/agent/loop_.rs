use super::control::AgentHandle;
use super::state::{AgentRunState, BackoffPolicy, Phase, StopReason, classify, cooling};
use crate::attachments::{AttachmentSource, CaptureRequest};
use crate::canvas::{LocalCanvasState, PixelCommand};
use crate::color::vivid_palette;
use crate::config::Config;
use crate::dispatch::ProgressiveDispatcher;
use crate::llm::{Adapter, Attachment, Credentials, Reply};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::parser::ParseResult;
use crate::postprocess::PostProcessor;
use crate::prompt::{PromptBuilder, PromptContext, RenderedPrompt};
use crate::training::{self, ExerciseSpec, Verdict};
use crate::transport::{CanvasTransport, PixelSink};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ── Public types ─────────────────────────────────────────────────────────────

/// Collaborators the loop talks to.
pub struct AgentDeps {
    pub adapter: Arc<dyn Adapter>,
    pub credentials: Credentials,
    pub transport: Arc<dyn CanvasTransport>,
    pub attachments: Arc<dyn AttachmentSource>,
    pub observer: Arc<dyn Observer>,
    pub prompts: PromptBuilder,
}

/// Tunables of one run.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Target time between iteration starts.
    pub interval: Duration,
    pub max_batch: usize,
    pub policy: BackoffPolicy,
    pub clarify: bool,
    /// Share of `interval` a batch may be spread over.
    pub dispatch_share: f64,
    pub vivid_colors: usize,
    pub custom_prompt: Option<String>,
    pub exercise: Option<&'static ExerciseSpec>,
    pub auto_advance: bool,
    /// Model label for the start event.
    pub model: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        let exercise = if config.training.enabled {
            training::exercise(&config.training.exercise)
        } else {
            None
        };
        Self {
            interval: config.agent.interval(),
            max_batch: config.agent.max_batch,
            policy: BackoffPolicy::from_config(&config.agent),
            clarify: config.agent.clarify,
            dispatch_share: config.agent.dispatch_share,
            vivid_colors: config.prompts.vivid_colors,
            custom_prompt: config.prompts.custom_prompt.clone(),
            exercise,
            auto_advance: config.training.auto_advance,
            model: config.model.clone().unwrap_or_else(|| "default".into()),
        }
    }

    /// Time budget handed to the dispatcher.
    pub fn dispatch_budget(&self) -> Duration {
        self.interval.mul_f64(self.dispatch_share.clamp(0.0, 1.0))
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    /// Iterations that painted a batch.
    pub completed: u64,
    pub painted: u64,
}

// ── Internal types ───────────────────────────────────────────────────────────

/// Lets the dispatcher hold the transport as a plain pixel sink.
struct TransportSink(Arc<dyn CanvasTransport>);

impl PixelSink for TransportSink {
    fn send_pixel(&self, cmd: &PixelCommand) -> anyhow::Result<()> {
        self.0.send_pixel(cmd)
    }
}

/// Result of one pass through Rendering → Dispatching.
enum Outcome {
    Painted,
    /// Back off this long, or until the cadence slot ends if that is later.
    Retry(Duration),
    /// Render again after exactly this delay.
    Redo(Duration),
    Stop(StopReason),
}

// ── Implementation ───────────────────────────────────────────────────────────

/// Drives one agent: render, invoke, parse, validate, dispatch, cool down.
///
/// Iterations never overlap. The only work that outlives an iteration is the
/// dispatcher's pending pixels, which are cancelled before the next batch
/// and on stop.
pub struct IterationLoop {
    deps: AgentDeps,
    settings: LoopSettings,
    state: AgentRunState,
    canvas: Arc<Mutex<LocalCanvasState>>,
    dispatcher: ProgressiveDispatcher,
    post: PostProcessor,
    rng: StdRng,
    handle: AgentHandle,
}

impl IterationLoop {
    pub fn new(deps: AgentDeps, settings: LoopSettings) -> Self {
        let canvas = Arc::new(Mutex::new(deps.transport.own_canvas()));
        let sink = Arc::new(TransportSink(Arc::clone(&deps.transport)));
        let dispatcher = ProgressiveDispatcher::new(sink, Arc::clone(&canvas));
        Self {
            state: AgentRunState::new(settings.exercise),
            post: PostProcessor::new(settings.max_batch),
            rng: StdRng::from_rng(&mut rand::rng()),
            handle: AgentHandle::new(),
            deps,
            settings,
            canvas,
            dispatcher,
        }
    }

    /// Fix the random source (vivid colors, placeholder repair).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Swap in a dispatcher with custom pacing limits.
    #[must_use]
    pub fn with_dispatch_limits(mut self, min_delay: Duration, max_window: Duration) -> Self {
        let sink = Arc::new(TransportSink(Arc::clone(&self.deps.transport)));
        self.dispatcher = ProgressiveDispatcher::new(sink, Arc::clone(&self.canvas))
            .with_limits(min_delay, max_window);
        self
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> &AgentRunState {
        &self.state
    }

    pub fn canvas(&self) -> LocalCanvasState {
        self.canvas.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Run until stopped, the canvas connection drops or a failure budget
    /// runs out.
    pub async fn run(mut self) -> RunSummary {
        let position = self.deps.transport.my_position();
        self.deps.observer.record_event(&ObserverEvent::AgentStart {
            adapter: self.deps.adapter.name().to_string(),
            model: self.settings.model.clone(),
            position: position.map(|p| p.to_string()),
        });

        let mut completed = 0;
        let reason = loop {
            if let Some(reason) = self.interrupted() {
                break reason;
            }
            if self.handle.is_paused() {
                self.state.phase = Phase::Paused;
                tracing::info!(iteration = self.state.iteration, "agent paused");
            }
            if !self.handle.wait_unpaused().await {
                break StopReason::Requested;
            }

            let started = Instant::now();
            let wait = match self.iterate().await {
                Outcome::Painted => {
                    completed += 1;
                    cooling(self.settings.interval, started.elapsed())
                }
                Outcome::Retry(wait) => wait.max(cooling(self.settings.interval, started.elapsed())),
                Outcome::Redo(wait) => wait,
                Outcome::Stop(reason) => break reason,
            };

            self.state.phase = Phase::Cooling;
            if !wait.is_zero() {
                tracing::debug!(wait_ms = millis(wait), "cooling");
            }
            if let Some(reason) = self.sleep(wait).await {
                break reason;
            }
        };

        self.dispatcher.cancel_all();
        self.state.phase = Phase::Stopped;
        match &reason {
            StopReason::Requested => tracing::info!(reason = %reason, "agent stopped"),
            _ => tracing::error!(reason = %reason, "agent stopped"),
        }
        self.deps.observer.record_event(&ObserverEvent::AgentStopped {
            reason: reason.to_string(),
        });
        self.deps.observer.flush();

        RunSummary {
            reason,
            completed,
            painted: self.state.painted_total,
        }
    }

    fn interrupted(&self) -> Option<StopReason> {
        if self.handle.is_stopped() {
            Some(StopReason::Requested)
        } else if !self.deps.transport.is_connected() {
            Some(StopReason::TransportLost)
        } else {
            None
        }
    }

    /// Sleep unless stopped or disconnected first.
    async fn sleep(&self, wait: Duration) -> Option<StopReason> {
        let stop = self.handle.stop_token();
        let lost = self.deps.transport.lost();
        tokio::select! {
            () = stop.cancelled() => Some(StopReason::Requested),
            () = lost.cancelled() => Some(StopReason::TransportLost),
            () = tokio::time::sleep(wait) => None,
        }
    }

    async fn iterate(&mut self) -> Outcome {
        let iteration = self.state.iteration;

        // ── Rendering ──
        self.state.phase = Phase::Rendering;
        let ctx = self.prompt_context();
        let mut rendered = match self.deps.prompts.build(&ctx) {
            Ok(rendered) => rendered,
            Err(e) => return self.invocation_failed(&anyhow::Error::new(e)),
        };
        let attachments = self.capture(&ctx, &rendered).await;
        if !attachments.is_empty() {
            rendered.note_attachments();
        }

        // ── Invoking ──
        let reply = match self.invoke(&rendered, &attachments).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return Outcome::Stop(self.interrupted().unwrap_or(StopReason::Requested)),
            Err(e) => return self.invocation_failed(&e),
        };

        // ── Parsing ──
        self.state.phase = Phase::Parsing;
        let mut parsed = self.deps.adapter.parse_reply(&reply.text, &mut self.rng);
        if parsed.is_empty() && self.settings.clarify {
            let intention = parsed.narrative().intention.clone().unwrap_or_default();
            tracing::info!(iteration, "no pixels in reply, asking again");
            let followup = rendered.clarify(&intention);
            match self.invoke(&followup, &[]).await {
                Ok(Some(reply)) => {
                    let mut retry = self.deps.adapter.parse_reply(&reply.text, &mut self.rng);
                    if let ParseResult::Commands { narrative, .. } = &mut retry {
                        narrative.merge_missing(parsed.narrative().clone());
                    }
                    parsed = retry;
                }
                Ok(None) => {
                    return Outcome::Stop(self.interrupted().unwrap_or(StopReason::Requested));
                }
                Err(e) => return self.invocation_failed(&e),
            }
        }
        if let ParseResult::Empty { raw, .. } = &parsed {
            tracing::debug!(reply = %truncate(raw, 300), "unparseable reply");
            return self.empty_reply("no pixel commands in reply");
        }
        tracing::debug!(
            iteration,
            strategy = ?parsed.strategy(),
            commands = parsed.commands().len(),
            "reply parsed"
        );

        // ── Validating ──
        if let Some(exercise) = self.state.exercise {
            self.state.phase = Phase::Validating;
            if let Verdict::Rejected(why) = training::check(exercise, parsed.commands()) {
                tracing::warn!(
                    exercise = exercise.id,
                    reason = %why,
                    retry_secs = self.settings.policy.validation_retry.as_secs(),
                    "exercise rejected, retrying"
                );
                self.deps.observer.record_event(&ObserverEvent::ValidationRejected {
                    exercise: exercise.id.to_string(),
                });
                return Outcome::Redo(self.settings.policy.validation_retry);
            }
        }

        let narrative = parsed.narrative().clone();
        let batch = {
            let current = self.canvas();
            let (batch, report) = self.post.process(parsed.into_commands(), &current);
            tracing::debug!(?report, kept = batch.len(), "batch post-processed");
            batch
        };
        if batch.is_empty() {
            return self.empty_reply("batch changes nothing on the grid");
        }

        // ── Dispatching ──
        let Some(painted) = self.dispatch(batch).await else {
            return Outcome::Stop(self.interrupted().unwrap_or(StopReason::Requested));
        };

        self.state.record_success(painted);
        if let Some(strategy) = narrative.strategy.as_deref() {
            self.deps.transport.record_strategy(strategy);
        }
        self.state.last_strategy = narrative.strategy.clone().or(self.state.last_strategy.take());
        self.state.last_intention = narrative.intention.clone().or(self.state.last_intention.take());
        if narrative.description.is_some() {
            self.state.local_description = narrative.description.clone();
        }
        if narrative.global_vision.is_some() {
            self.state.global_description = narrative.global_vision.clone();
        }

        tracing::info!(
            iteration,
            commands = painted,
            strategy = ?narrative.strategy,
            "iteration painted"
        );
        self.deps.observer.record_event(&ObserverEvent::IterationSucceeded {
            iteration,
            commands: painted,
            strategy: narrative.strategy,
        });
        self.deps
            .observer
            .record_metric(&ObserverMetric::CommandsDispatched(
                u64::try_from(painted).unwrap_or(u64::MAX),
            ));
        self.advance_exercise();
        Outcome::Painted
    }

    fn prompt_context(&mut self) -> PromptContext {
        let mut ctx = PromptContext::new(self.state.iteration, self.deps.adapter.dialect());
        ctx.position = self.deps.transport.my_position();
        ctx.canvas = self.canvas();
        ctx.neighbors = self.deps.transport.neighbors();
        ctx.vivid = vivid_palette(&mut self.rng, self.settings.vivid_colors);
        ctx.last_strategy.clone_from(&self.state.last_strategy);
        ctx.last_intention.clone_from(&self.state.last_intention);
        ctx.local_description.clone_from(&self.state.local_description);
        ctx.global_description.clone_from(&self.state.global_description);
        ctx.custom_prompt.clone_from(&self.settings.custom_prompt);
        ctx.exercise = self.state.exercise;
        ctx
    }

    /// Images for this prompt. Capture failures only cost the images.
    async fn capture(&self, ctx: &PromptContext, rendered: &RenderedPrompt) -> Vec<Attachment> {
        if !rendered.wants_attachments || self.deps.adapter.max_attachments() == 0 {
            return Vec::new();
        }
        let request = CaptureRequest::new(ctx.position, &ctx.canvas);
        match self.deps.attachments.capture(&request).await {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(source = self.deps.attachments.name(), error = %e, "attachment capture failed");
                Vec::new()
            }
        }
    }

    /// `Ok(None)` when the run was stopped or disconnected mid-request; the
    /// late reply, if any, is dropped.
    async fn invoke(
        &mut self,
        rendered: &RenderedPrompt,
        attachments: &[Attachment],
    ) -> anyhow::Result<Option<Reply>> {
        self.state.phase = Phase::Invoking;
        let prompt = self.deps.adapter.build_prompt(rendered);
        let stop = self.handle.stop_token();
        let lost = self.deps.transport.lost();
        let started = Instant::now();

        let reply = tokio::select! {
            () = stop.cancelled() => return Ok(None),
            () = lost.cancelled() => return Ok(None),
            reply = self.deps.adapter.invoke(&self.deps.credentials, &prompt, attachments) => reply?,
        };

        self.deps
            .observer
            .record_metric(&ObserverMetric::InvocationLatency(started.elapsed()));
        if let Some(tokens) = reply.usage.total() {
            self.deps.observer.record_metric(&ObserverMetric::TokensUsed(tokens));
        }
        Ok(Some(reply))
    }

    fn invocation_failed(&mut self, err: &anyhow::Error) -> Outcome {
        let kind = classify(err);
        let failures = self.state.record_failure();
        let backoff = self
            .settings
            .policy
            .for_failure(kind, failures, self.settings.interval);
        self.state.current_backoff = backoff;
        self.deps.observer.record_event(&ObserverEvent::IterationFailed {
            iteration: self.state.iteration,
            reason: kind.label().to_string(),
            backoff,
        });

        if failures >= self.settings.policy.max_failures {
            tracing::error!(
                adapter = self.deps.adapter.name(),
                failures,
                error = %crate::llm::sanitize_api_error(&format!("{err:#}")),
                "invocation failure budget exhausted"
            );
            return Outcome::Stop(StopReason::InvocationFailures(failures));
        }
        tracing::warn!(
            adapter = self.deps.adapter.name(),
            kind = kind.label(),
            failures,
            backoff_secs = backoff.as_secs(),
            error = %crate::llm::sanitize_api_error(&format!("{err:#}")),
            "invocation failed, backing off"
        );
        Outcome::Retry(backoff)
    }

    fn empty_reply(&mut self, why: &str) -> Outcome {
        let empties = self.state.record_empty();
        let backoff = self.settings.policy.empty;
        self.state.current_backoff = backoff;
        self.deps.observer.record_event(&ObserverEvent::IterationFailed {
            iteration: self.state.iteration,
            reason: "empty".to_string(),
            backoff,
        });

        if empties >= self.settings.policy.max_empty {
            tracing::error!(empties, reason = why, "empty reply budget exhausted");
            return Outcome::Stop(StopReason::EmptyReplies(empties));
        }
        tracing::warn!(
            empties,
            reason = why,
            backoff_secs = backoff.as_secs(),
            "nothing to paint, backing off"
        );
        Outcome::Retry(backoff)
    }

    /// Spread the batch and wait for it. `None` when interrupted; pending
    /// pixels are cancelled.
    async fn dispatch(&mut self, batch: Vec<PixelCommand>) -> Option<usize> {
        self.state.phase = Phase::Dispatching;
        let count = batch.len();
        let plan = self.dispatcher.dispatch(batch, self.settings.dispatch_budget());
        tracing::debug!(
            commands = count,
            window_ms = millis(plan.window()),
            "dispatching batch"
        );

        let stop = self.handle.stop_token();
        let lost = self.deps.transport.lost();
        tokio::select! {
            () = stop.cancelled() => {
                self.dispatcher.cancel_all();
                None
            }
            () = lost.cancelled() => {
                self.dispatcher.cancel_all();
                None
            }
            () = self.dispatcher.wait_idle() => Some(count),
        }
    }

    fn advance_exercise(&mut self) {
        let Some(current) = self.state.exercise else {
            return;
        };
        if !(self.settings.auto_advance && current.auto_advance) {
            return;
        }
        if let Some(next) = training::next_exercise(current.id) {
            tracing::info!(from = current.id, to = next.id, "exercise advanced");
            self.deps.observer.record_event(&ObserverEvent::ExerciseAdvanced {
                from: current.id.to_string(),
                to: next.id.to_string(),
            });
            self.state.exercise = Some(next);
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(i, _)| &text[..i])
}
