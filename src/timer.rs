use std::time::{Duration, Instant};

/// Fixed-period tick source on a monotonic clock.
///
/// Deadlines advance by exactly one period each, so a late wake-up owes
/// several ticks instead of drifting.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next_tick: Instant,
}

impl Ticker {
    pub fn new(period: Duration, start: Instant) -> Self {
        Ticker {
            period,
            next_tick: start + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of ticks whose deadline has passed at `now`, consuming them.
    pub fn owed(&mut self, now: Instant) -> u32 {
        let mut owed = 0;
        while now >= self.next_tick {
            self.next_tick += self.period;
            owed += 1;
        }
        owed
    }

    /// Drop any backlog and restart the cadence from `now`.
    pub fn resync(&mut self, now: Instant) {
        self.next_tick = now + self.period;
    }

    /// Time left until the next deadline, never more than one period.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_tick
            .saturating_duration_since(now)
            .min(self.period)
    }
}
