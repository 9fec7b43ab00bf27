//! Countdown to a deadline, ticking once per second.
//!
//! [`Countdown`] is the pure part: given `now`, how much is left, and has
//! expiry been reported yet. [`CountdownTimer`] drives one on a tokio task.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vouch_types::{Clock, Timestamp};

/// Whole seconds from `now` until `deadline`, zero once it has passed.
pub fn seconds_remaining(deadline: Timestamp, now: Timestamp) -> u64 {
    deadline.secs_until(now)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownTick {
    /// Still counting; seconds left.
    Remaining(u64),
    /// Reached zero. Reported exactly once.
    Expired,
    /// Already expired on an earlier tick.
    Finished,
}

#[derive(Clone, Debug)]
pub struct Countdown {
    deadline: Timestamp,
    expired: bool,
}

impl Countdown {
    pub fn new(deadline: Timestamp) -> Self {
        Self {
            deadline,
            expired: false,
        }
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn remaining(&self, now: Timestamp) -> u64 {
        seconds_remaining(self.deadline, now)
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn tick(&mut self, now: Timestamp) -> CountdownTick {
        if self.expired {
            return CountdownTick::Finished;
        }
        match self.remaining(now) {
            0 => {
                self.expired = true;
                CountdownTick::Expired
            }
            left => CountdownTick::Remaining(left),
        }
    }
}

/// What a running timer reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining: u64 },
    Expired,
}

/// A countdown running on its own task.
///
/// The first tick fires immediately, then once per second. The task ends
/// after reporting expiry. Dropping the timer cancels it.
pub struct CountdownTimer {
    deadline: Timestamp,
    handle: JoinHandle<()>,
}

impl CountdownTimer {
    pub fn start<F>(deadline: Timestamp, clock: Arc<dyn Clock>, mut on_event: F) -> Self
    where
        F: FnMut(TimerEvent) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut countdown = Countdown::new(deadline);
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match countdown.tick(clock.now()) {
                    CountdownTick::Remaining(remaining) => {
                        on_event(TimerEvent::Tick { remaining });
                    }
                    CountdownTick::Expired => {
                        tracing::debug!(%deadline, "countdown expired");
                        on_event(TimerEvent::Expired);
                        break;
                    }
                    CountdownTick::Finished => break,
                }
            }
        });
        Self { deadline, handle }
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use vouch_nullables::NullClock;

    #[test]
    fn expiry_reported_exactly_once_after_n_ticks() {
        let clock = NullClock::new(1_000);
        let n = 5;
        let mut countdown = Countdown::new(clock.now().plus_secs(n));
        let mut expiries = 0;
        let mut ticks_before_expiry = 0;
        for _ in 0..(n + 10) {
            match countdown.tick(clock.now()) {
                CountdownTick::Remaining(_) => ticks_before_expiry += 1,
                CountdownTick::Expired => expiries += 1,
                CountdownTick::Finished => {}
            }
            clock.advance(1);
        }
        assert_eq!(expiries, 1);
        assert_eq!(ticks_before_expiry, n);
    }

    #[test]
    fn past_deadline_expires_on_first_tick() {
        let mut countdown = Countdown::new(Timestamp::new(10));
        assert_eq!(countdown.tick(Timestamp::new(50)), CountdownTick::Expired);
        assert_eq!(countdown.tick(Timestamp::new(51)), CountdownTick::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expires_at_deadline() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::starting_at(Timestamp::new(500)));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let started = Instant::now();
        let expired_at = Arc::new(Mutex::new(None));
        let expired_sink = Arc::clone(&expired_at);

        let timer = CountdownTimer::start(Timestamp::new(503), clock, move |event| {
            if event == TimerEvent::Expired {
                *expired_sink.lock().unwrap() = Some(Instant::now());
            }
            sink.lock().unwrap().push(event);
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!timer.is_running());
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                TimerEvent::Tick { remaining: 3 },
                TimerEvent::Tick { remaining: 2 },
                TimerEvent::Tick { remaining: 1 },
                TimerEvent::Expired,
            ]
        );
        let fired = expired_at.lock().unwrap().unwrap();
        assert_eq!(fired - started, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_stops_ticking() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::starting_at(Timestamp::new(0)));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let timer = CountdownTimer::start(Timestamp::new(60), clock, move |e| {
            sink.lock().unwrap().push(e)
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(timer);
        let seen = events.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(events.lock().unwrap().len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_timers_do_not_interfere() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::starting_at(Timestamp::new(0)));
        let a_events = Arc::new(Mutex::new(Vec::new()));
        let b_events = Arc::new(Mutex::new(Vec::new()));
        let (a_sink, b_sink) = (Arc::clone(&a_events), Arc::clone(&b_events));
        let a = CountdownTimer::start(Timestamp::new(2), Arc::clone(&clock), move |e| {
            a_sink.lock().unwrap().push(e)
        });
        let _b = CountdownTimer::start(Timestamp::new(4), clock, move |e| {
            b_sink.lock().unwrap().push(e)
        });
        drop(a);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(b_events.lock().unwrap().last(), Some(&TimerEvent::Expired));
        assert!(!a_events.lock().unwrap().contains(&TimerEvent::Expired));
    }
}
