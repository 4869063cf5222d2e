//! services/api/src/web/ticker.rs
//!
//! A cancellable elapsed-time ticker for an active reading session.
//!
//! The original app refreshed its elapsed display from a repeating UI timer
//! kept alive by view identity, which leaks a recurring callback if a view
//! disappears mid-session. Here the timer is an explicit task guarded by a
//! `CancellationToken`: `stop()` ends it, and `Drop` ends it on every other
//! exit path.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Publishes the active session's elapsed milliseconds every 100 ms.
///
/// While paused the published value stops updating, freezing the displayed
/// clock; the session's start time is never adjusted, so resuming snaps back
/// to wall-clock elapsed.
pub struct ElapsedTicker {
    token: CancellationToken,
    paused: watch::Sender<bool>,
    elapsed_ms: watch::Receiver<i64>,
    task: JoinHandle<()>,
}

impl ElapsedTicker {
    pub fn spawn(started_at: DateTime<Utc>) -> Self {
        let token = CancellationToken::new();
        let (paused_tx, paused_rx) = watch::channel(false);
        let (elapsed_tx, elapsed_rx) =
            watch::channel((Utc::now() - started_at).num_milliseconds());

        let child_token = token.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            loop {
                tokio::select! {
                    _ = child_token.cancelled() => break,
                    _ = interval.tick() => {
                        if !*paused_rx.borrow() {
                            let _ = elapsed_tx
                                .send((Utc::now() - started_at).num_milliseconds());
                        }
                    }
                }
            }
        });

        Self {
            token,
            paused: paused_tx,
            elapsed_ms: elapsed_rx,
            task,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        let _ = self.paused.send(paused);
    }

    /// The most recently published elapsed value.
    pub fn elapsed_ms(&self) -> i64 {
        *self.elapsed_ms.borrow()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticker_advances_and_freezes_while_paused() {
        let ticker = ElapsedTicker::spawn(Utc::now());
        tokio::time::sleep(Duration::from_millis(250)).await;
        let running = ticker.elapsed_ms();
        assert!(running >= 100, "expected at least one tick, got {running}");

        ticker.set_paused(true);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let frozen = ticker.elapsed_ms();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(ticker.elapsed_ms(), frozen);

        ticker.set_paused(false);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(ticker.elapsed_ms() > frozen);
    }

    #[tokio::test]
    async fn stop_halts_publishing() {
        let ticker = ElapsedTicker::spawn(Utc::now());
        tokio::time::sleep(Duration::from_millis(150)).await;
        ticker.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopped = ticker.elapsed_ms();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(ticker.elapsed_ms(), stopped);
    }
}
