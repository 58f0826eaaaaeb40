use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Stand-in deadline for durations the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + duration`, saturating instead of panicking on overflow.
pub(crate) fn deadline_after(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Time left on one displayed timer, measured against a fixed deadline so
/// late ticks never accumulate drift.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Instant,
}

impl Countdown {
    pub fn new(duration: Duration, started_at: Instant) -> Self {
        Self {
            deadline: deadline_after(started_at, duration),
        }
    }

    /// Clamped at zero.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Drives a countdown on a fixed tick.
///
/// `on_tick` receives the remaining time while it is positive and returns
/// `false` to abandon the countdown. Returns `true` once the deadline is
/// reached, exactly once per countdown.
pub async fn run_countdown<F, Fut>(duration: Duration, tick: Duration, mut on_tick: F) -> bool
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = bool>,
{
    let started_at = Instant::now();
    let countdown = Countdown::new(duration, started_at);
    let mut ticker = time::interval_at(deadline_after(started_at, tick), tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let now = ticker.tick().await;
        if countdown.is_finished(now) {
            return true;
        }
        if !on_tick(countdown.remaining(now)).await {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    #[test]
    fn remaining_never_goes_negative() {
        let start = Instant::now();
        let countdown = Countdown::new(Duration::from_secs(9), start);
        assert_eq!(countdown.remaining(start), Duration::from_secs(9));
        assert_eq!(
            countdown.remaining(start + Duration::from_millis(8_900)),
            Duration::from_millis(100)
        );
        assert_eq!(countdown.remaining(start + Duration::from_secs(12)), Duration::ZERO);
        assert!(countdown.is_finished(start + Duration::from_secs(9)));
    }

    #[test]
    fn unrepresentable_duration_saturates() {
        let start = Instant::now();
        let countdown = Countdown::new(Duration::MAX, start);
        assert!(!countdown.is_finished(start + Duration::from_secs(3_600)));
        assert!(countdown.remaining(start) > Duration::from_secs(86_400));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_down_then_finishes_once() {
        let mut seen = Vec::new();
        let finished = run_countdown(Duration::from_secs(9), Duration::from_millis(100), |left| {
            seen.push(left);
            ready(true)
        })
        .await;

        assert!(finished);
        assert_eq!(seen.len(), 89);
        assert_eq!(seen.first(), Some(&Duration::from_millis(8_900)));
        assert_eq!(seen.last(), Some(&Duration::from_millis(100)));
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_countdown_does_not_finish() {
        let mut ticks = 0;
        let finished = run_countdown(Duration::from_secs(5), Duration::from_millis(100), |_| {
            ticks += 1;
            ready(ticks < 3)
        })
        .await;

        assert!(!finished);
        assert_eq!(ticks, 3);
    }
}
