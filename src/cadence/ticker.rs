//! Cadence status timer
//!
//! A single background task that re-evaluates the cadence on a fixed tick
//! and publishes the result on a `watch` channel. Countdowns shown from the
//! channel may be stale by up to one tick.

use crate::cadence::engine::CadenceEngine;
use crate::cadence::state::CadenceStatus;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running status timer; aborts the task on drop
pub(crate) struct CadenceTicker {
    handle: JoinHandle<()>,
}

impl CadenceTicker {
    /// Stop the timer
    pub(crate) fn cancel(self) {
        // Drop aborts the task
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CadenceTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the timer task
///
/// The task holds only a weak reference so it never keeps the engine alive.
/// It exits on its own once the engine is gone or nobody is subscribed.
pub(crate) fn spawn(
    engine: Weak<CadenceEngine>,
    tick: Duration,
    initial: CadenceStatus,
) -> (CadenceTicker, watch::Receiver<CadenceStatus>) {
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("No cadence subscribers left, stopping ticker");
                break;
            }

            let Some(engine) = engine.upgrade() else {
                break;
            };
            let status = engine.status().await;
            drop(engine);

            let previous = tx.borrow().stage;
            if previous != status.stage {
                tracing::info!(from = %previous, to = %status.stage, "Cadence stage changed");
            }
            tx.send_replace(status);
        }
    });

    (CadenceTicker { handle }, rx)
}

#[cfg(test)]
mod tests {
    use crate::cadence::engine::CadenceEngine;
    use crate::cadence::state::{CadenceRules, CadenceStage};
    use crate::storage::{HealthRepository, MemoryStore, SymptomRating};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> Arc<CadenceEngine> {
        let repo = HealthRepository::new(Arc::new(MemoryStore::new()));
        Arc::new(CadenceEngine::new(repo, CadenceRules::default()))
    }

    #[tokio::test]
    async fn test_ticker_publishes_status() {
        let engine = engine();
        let mut rx = engine.start_ticker(Duration::from_millis(10)).await;
        assert!(rx.borrow().can_submit);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().stage, CadenceStage::AwaitingMorning);
        assert!(engine.is_ticking());

        engine.stop_ticker();
        assert!(!engine.is_ticking());
    }

    #[tokio::test]
    async fn test_ticker_picks_up_submission() {
        let engine = engine();
        let mut rx = engine.start_ticker(Duration::from_millis(10)).await;

        engine.submit(SymptomRating::defaults()).await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                if rx.borrow().stage == CadenceStage::MorningCooldown {
                    break;
                }
            }
        })
        .await;
        assert!(seen.is_ok());
        assert!(!rx.borrow().can_submit);
        assert!(rx.borrow().remaining.is_some());
    }

    #[tokio::test]
    async fn test_ticker_stops_without_subscribers() {
        let engine = engine();
        let rx = engine.start_ticker(Duration::from_millis(10)).await;
        drop(rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!engine.is_ticking());
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_timer() {
        let engine = engine();
        let first = engine.start_ticker(Duration::from_millis(10)).await;
        let mut second = engine.start_ticker(Duration::from_millis(10)).await;

        second.changed().await.unwrap();
        assert!(engine.is_ticking());

        // The first timer was aborted; its sender is gone
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(first.has_changed().is_err());
    }
}
