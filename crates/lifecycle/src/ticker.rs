//! Fixed-interval driver for the sweepers.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run `tick` every `period` until `cancel` fires.
///
/// A tick that is still running when the next one is due is abandoned
/// (dropped at its next await point), so two ticks of the same sweeper never
/// overlap. Ticks missed while a slow one ran are skipped, not bursted.
pub async fn run_ticks<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(sweeper = name, interval_secs = period.as_secs(), "Sweeper started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(sweeper = name, "Sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(sweeper = name, "Sweeper stopping mid-tick");
                        break;
                    }
                    outcome = tokio::time::timeout(period, tick()) => {
                        if outcome.is_err() {
                            tracing::error!(
                                sweeper = name,
                                timeout_secs = period.as_secs(),
                                "Sweep overran its interval and was abandoned"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let count = count.clone();
            let cancel = cancel.clone();
            async move {
                run_ticks("test", Duration::from_secs(60), cancel, || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await;
            }
        });

        // Immediate first tick plus one per minute.
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_tick_is_abandoned() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let started = started.clone();
            let finished = finished.clone();
            let cancel = cancel.clone();
            async move {
                run_ticks("slow", Duration::from_secs(10), cancel, || {
                    let started = started.clone();
                    let finished = finished.clone();
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(25)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await;
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        cancel.cancel();
        task.await.unwrap();
        assert!(started.load(Ordering::SeqCst) >= 2);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
