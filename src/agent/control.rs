use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// External run control for one agent. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    stop: CancellationToken,
    paused: watch::Sender<bool>,
}

impl AgentHandle {
    pub(crate) fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            stop: CancellationToken::new(),
            paused,
        }
    }

    /// Hold the agent before its next iteration starts.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Stop now: pending pixels are cancelled and an in-flight request is
    /// abandoned.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once the agent is not paused. Returns `false` if stopped
    /// while waiting.
    pub(crate) async fn wait_unpaused(&self) -> bool {
        let mut rx = self.paused.subscribe();
        tokio::select! {
            () = self.stop.cancelled() => false,
            res = rx.wait_for(|paused| !*paused) => res.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn unpaused_handle_does_not_wait() {
        let handle = AgentHandle::new();
        assert!(handle.wait_unpaused().await);
    }

    #[tokio::test]
    async fn resume_releases_a_paused_wait() {
        let handle = AgentHandle::new();
        handle.pause();
        assert!(handle.is_paused());
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_unpaused().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        handle.resume();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn stop_releases_a_paused_wait_with_false() {
        let handle = AgentHandle::new();
        handle.pause();
        handle.stop();
        assert!(!handle.wait_unpaused().await);
        assert!(handle.is_stopped());
    }
}
