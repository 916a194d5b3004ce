//! Fixed-rate loop pacing.

use std::time::{Duration, Instant};

use guard_traits::Clock;

/// Sleeps until the next tick boundary.
///
/// Deadlines advance by a fixed period from the first tick, so time spent in
/// the loop body does not accumulate as drift. A loop that overruns a whole
/// period re-anchors on the current time instead of bursting to catch up.
pub struct Ticker<'a> {
    clock: &'a dyn Clock,
    period: Duration,
    next: Instant,
}

impl<'a> Ticker<'a> {
    pub fn new(clock: &'a dyn Clock, hz: u32) -> Self {
        let period = Duration::from_micros(crate::util::period_us(hz));
        Self {
            clock,
            period,
            next: clock.now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn wait(&mut self) {
        self.next += self.period;
        let now = self.clock.now();
        if self.next > now {
            self.clock.sleep(self.next - now);
        } else {
            self.next = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guard_traits::ManualClock;

    #[test]
    fn ten_hz_ticks_advance_virtual_time() {
        let clock = ManualClock::new();
        let mut t = Ticker::new(&clock, 10);
        for _ in 0..5 {
            t.wait();
        }
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn body_time_is_absorbed() {
        let clock = ManualClock::new();
        let mut t = Ticker::new(&clock, 10);
        clock.advance(Duration::from_millis(30));
        t.wait();
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn overrun_reanchors() {
        let clock = ManualClock::new();
        let mut t = Ticker::new(&clock, 10);
        clock.advance(Duration::from_millis(250));
        t.wait();
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        t.wait();
        assert_eq!(clock.elapsed(), Duration::from_millis(350));
    }
}
