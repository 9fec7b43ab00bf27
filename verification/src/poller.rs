//! Periodic status polling with a single fetch in flight.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What the result handler wants the poller to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Re-runs a fetch on a fixed interval until told to stop.
///
/// - The first fetch happens one interval after start.
/// - Each fetch is awaited before the next tick is considered, so at most
///   one is in flight. Ticks that pass during a slow fetch are skipped,
///   not queued.
/// - A failed fetch is logged and the poller waits for the next tick.
/// - Dropping the poller (or calling [`cancel`](Self::cancel)) aborts the
///   task, including a fetch in progress.
pub struct ChallengePoller {
    handle: Option<JoinHandle<()>>,
}

impl ChallengePoller {
    pub fn start<T, E, F, Fut, H>(period: Duration, mut fetch: F, mut on_result: H) -> Self
    where
        T: Send + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        H: FnMut(T) -> PollControl + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let started = Instant::now();
                let result = fetch().await;
                if started.elapsed() >= period {
                    // Ticks that fell inside the fetch are dropped.
                    interval.reset();
                }
                match result {
                    Ok(value) => {
                        if on_result(value) == PollControl::Stop {
                            tracing::debug!("poller stopped by result");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "poll failed, retrying on next tick");
                    }
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ChallengePoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn first_fetch_waits_one_interval() {
        let fetched_at = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fetched_at);
        let start = Instant::now();
        let _poller = ChallengePoller::start(
            Duration::from_secs(10),
            move || {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(Instant::now());
                    Ok::<_, String>(())
                }
            },
            |_| PollControl::Continue,
        );
        tokio::time::sleep(Duration::from_secs(35)).await;
        let offsets: Vec<u64> = fetched_at
            .lock()
            .unwrap()
            .iter()
            .map(|t| (*t - start).as_secs())
            .collect();
        assert_eq!(offsets, vec![10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_never_overlaps() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (f, m, c) = (
            Arc::clone(&in_flight),
            Arc::clone(&max_in_flight),
            Arc::clone(&calls),
        );
        let _poller = ChallengePoller::start(
            Duration::from_secs(10),
            move || {
                let (f, m, c) = (Arc::clone(&f), Arc::clone(&m), Arc::clone(&c));
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    c.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(25)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            },
            |_| PollControl::Continue,
        );
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        // Fetches start at 10, 45, 80, 115: ticks during each 25 s fetch are skipped.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_wait_for_next_tick_then_stop_on_result() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&attempts);
        let poller = ChallengePoller::start(
            Duration::from_secs(10),
            move || {
                let n = a.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("network down".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            |n| {
                if n >= 3 {
                    PollControl::Stop
                } else {
                    PollControl::Continue
                }
            },
        );
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut poller = ChallengePoller::start(
            Duration::from_secs(10),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(()) }
            },
            |_| PollControl::Continue,
        );
        tokio::time::sleep(Duration::from_secs(15)).await;
        poller.cancel();
        assert!(!poller.is_active());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
