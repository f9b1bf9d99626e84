use std::thread;
use std::time::{Duration, Instant};

/// Source of session-relative tick times.
pub trait Ticker {
    /// Wait for the next tick and return its time since the session started.
    fn next_tick(&mut self) -> Duration;
}

/// Wall-clock ticks at a fixed period, like a display refresh.
pub struct IntervalTicker {
    start: Instant,
    period: Duration,
    next: Duration,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            start: Instant::now(),
            period,
            next: Duration::ZERO,
        }
    }

    /// Roughly display refresh rate.
    pub fn display() -> Self {
        Self::new(Duration::from_micros(16_667))
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Ticker for IntervalTicker {
    fn next_tick(&mut self) -> Duration {
        let now = self.start.elapsed();
        if now < self.next {
            thread::sleep(self.next - now);
        }
        let now = self.start.elapsed();
        // Skip missed ticks instead of bursting to catch up.
        while self.next <= now {
            self.next += self.period;
        }
        now
    }
}

/// Deterministic ticks for tests and simulations.
#[derive(Clone, Debug)]
pub struct ManualTicker {
    now: Duration,
    period: Duration,
    started: bool,
}

impl ManualTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            period,
            started: false,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn advance(&mut self, by: Duration) -> Duration {
        self.now += by;
        self.now
    }
}

impl Ticker for ManualTicker {
    fn next_tick(&mut self) -> Duration {
        if self.started {
            self.now += self.period;
        }
        self.started = true;
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticker_starts_at_zero() {
        let mut ticker = ManualTicker::new(Duration::from_millis(16));
        assert_eq!(ticker.next_tick(), Duration::ZERO);
        assert_eq!(ticker.next_tick(), Duration::from_millis(16));
        ticker.advance(Duration::from_millis(4));
        assert_eq!(ticker.next_tick(), Duration::from_millis(36));
    }

    #[test]
    fn interval_ticker_is_monotonic() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(2));
        let a = ticker.next_tick();
        let b = ticker.next_tick();
        assert!(b > a);
        assert!(b >= Duration::from_millis(2));
    }
}
