//! Progressive dispatch: a batch is spread over a time budget as
//! individually scheduled units so the canvas sees human-paced drawing.

mod plan;

pub use plan::{DEFAULT_MAX_STEP, DEFAULT_MAX_WINDOW, DEFAULT_MIN_DELAY, DispatchPlan};

use crate::canvas::{LocalCanvasState, PixelCommand};
use crate::transport::PixelSink;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Batch {
    token: CancellationToken,
    units: Vec<JoinHandle<()>>,
}

pub struct ProgressiveDispatcher {
    sink: Arc<dyn PixelSink>,
    canvas: Arc<Mutex<LocalCanvasState>>,
    min_delay: Duration,
    max_window: Duration,
    /// Held while a unit checks its token and sends, and while a batch is
    /// cancelled. A unit either finishes sending before `cancel_all`
    /// returns or never sends at all.
    gate: Arc<Mutex<()>>,
    current: Mutex<Option<Batch>>,
}

impl ProgressiveDispatcher {
    pub fn new(sink: Arc<dyn PixelSink>, canvas: Arc<Mutex<LocalCanvasState>>) -> Self {
        Self {
            sink,
            canvas,
            min_delay: DEFAULT_MIN_DELAY,
            max_window: DEFAULT_MAX_WINDOW,
            gate: Arc::new(Mutex::new(())),
            current: Mutex::new(None),
        }
    }

    pub fn with_limits(mut self, min_delay: Duration, max_window: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_window = max_window;
        self
    }

    pub fn plan(&self, count: usize, budget: Duration) -> DispatchPlan {
        DispatchPlan::new(count, budget, self.min_delay, self.max_window)
    }

    /// Schedule `commands` across `budget`. Any batch still pending is
    /// cancelled first. A zero budget means "no cadence": the batch gets
    /// `count × 200ms`, capped at the window ceiling.
    pub fn dispatch(&self, commands: Vec<PixelCommand>, budget: Duration) -> DispatchPlan {
        self.cancel_all();

        let plan = self.plan(commands.len(), budget);
        let token = CancellationToken::new();
        let start = Instant::now();

        let units = commands
            .into_iter()
            .enumerate()
            .map(|(index, cmd)| {
                let token = token.clone();
                let gate = Arc::clone(&self.gate);
                let sink = Arc::clone(&self.sink);
                let canvas = Arc::clone(&self.canvas);
                let at = start + plan.offset(index);
                tokio::spawn(async move {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = tokio::time::sleep_until(at) => {
                            fire(&gate, &token, sink.as_ref(), &canvas, &cmd);
                        }
                    }
                })
            })
            .collect();

        tracing::debug!(
            commands = plan.count,
            per_command_ms = u64::try_from(plan.per_command.as_millis()).unwrap_or(u64::MAX),
            window_ms = u64::try_from(plan.window().as_millis()).unwrap_or(u64::MAX),
            "batch scheduled"
        );

        if let Ok(mut current) = self.current.lock() {
            *current = Some(Batch { token, units });
        }
        plan
    }

    /// Cancel every pending unit of the current batch. After this returns
    /// no unit of that batch can send.
    pub fn cancel_all(&self) {
        let previous = self.current.lock().ok().and_then(|mut c| c.take());
        let Some(batch) = previous else {
            return;
        };
        let pending = batch.units.iter().filter(|u| !u.is_finished()).count();
        {
            let _gate = self.gate.lock();
            batch.token.cancel();
        }
        if pending > 0 {
            tracing::debug!(pending, "pending pixel units cancelled");
        }
    }

    /// Wait until every unit of the current batch has fired or been
    /// cancelled.
    pub async fn wait_idle(&self) {
        let units = self
            .current
            .lock()
            .ok()
            .and_then(|mut c| c.as_mut().map(|b| std::mem::take(&mut b.units)))
            .unwrap_or_default();
        for unit in units {
            let _ = unit.await;
        }
    }
}

impl Drop for ProgressiveDispatcher {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn fire(
    gate: &Mutex<()>,
    token: &CancellationToken,
    sink: &dyn PixelSink,
    canvas: &Mutex<LocalCanvasState>,
    cmd: &PixelCommand,
) {
    let Ok(_gate) = gate.lock() else {
        return;
    };
    if token.is_cancelled() {
        return;
    }
    match sink.send_pixel(cmd) {
        Ok(()) => {
            if let Ok(mut state) = canvas.lock() {
                state.mark_painted(cmd);
            }
        }
        Err(e) => {
            tracing::warn!(x = cmd.x, y = cmd.y, error = %e, "pixel send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::HexColor;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(PixelCommand, Instant)>>,
    }

    impl PixelSink for RecordingSink {
        fn send_pixel(&self, cmd: &PixelCommand) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((*cmd, Instant::now()));
            Ok(())
        }
    }

    struct FailingSink;

    impl PixelSink for FailingSink {
        fn send_pixel(&self, _cmd: &PixelCommand) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }
    }

    fn batch(n: i32, color: HexColor) -> Vec<PixelCommand> {
        (0..n).map(|i| PixelCommand::new(i, 0, color)).collect()
    }

    fn setup() -> (
        Arc<RecordingSink>,
        Arc<Mutex<LocalCanvasState>>,
        ProgressiveDispatcher,
    ) {
        let sink = Arc::new(RecordingSink::default());
        let canvas = Arc::new(Mutex::new(LocalCanvasState::new()));
        let dispatcher = ProgressiveDispatcher::new(sink.clone(), canvas.clone());
        (sink, canvas, dispatcher)
    }

    #[tokio::test(start_paused = true)]
    async fn batch_completes_within_window_in_order() {
        let (sink, canvas, dispatcher) = setup();
        let start = Instant::now();
        let plan = dispatcher.dispatch(batch(5, HexColor::from_rgb(1, 2, 3)), Duration::from_secs(1));
        dispatcher.wait_idle().await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 5);
        assert!(sent.windows(2).all(|w| w[0].0.x < w[1].0.x));
        let last = sent.last().unwrap().1;
        assert!(last - start <= plan.window());
        assert!(last - start <= Duration::from_secs(1));
        assert_eq!(canvas.lock().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_unit_emits_nothing() {
        let (sink, canvas, dispatcher) = setup();
        dispatcher.dispatch(batch(10, HexColor::BLACK), Duration::from_secs(2));
        dispatcher.cancel_all();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(sink.sent.lock().unwrap().is_empty());
        assert!(canvas.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_batch_cancels_the_previous_one() {
        let (sink, _canvas, dispatcher) = setup();
        let first = HexColor::from_rgb(255, 0, 0);
        let second = HexColor::from_rgb(0, 0, 255);

        dispatcher.dispatch(batch(10, first), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let switch = Instant::now();
        dispatcher.dispatch(batch(3, second), Duration::from_secs(3));
        dispatcher.wait_idle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let sent = sink.sent.lock().unwrap();
        let firsts: Vec<_> = sent.iter().filter(|(c, _)| c.color == first).collect();
        assert!(!firsts.is_empty() && firsts.len() < 10);
        assert!(firsts.iter().all(|(_, at)| *at <= switch));
        assert_eq!(sent.iter().filter(|(c, _)| c.color == second).count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_are_not_marked_painted() {
        let canvas = Arc::new(Mutex::new(LocalCanvasState::new()));
        let dispatcher = ProgressiveDispatcher::new(Arc::new(FailingSink), canvas.clone());
        dispatcher.dispatch(batch(2, HexColor::BLACK), Duration::from_millis(200));
        dispatcher.wait_idle().await;
        assert!(canvas.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_a_no_op() {
        let (sink, _canvas, dispatcher) = setup();
        let plan = dispatcher.dispatch(Vec::new(), Duration::from_secs(1));
        dispatcher.wait_idle().await;
        assert_eq!(plan.count, 0);
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
