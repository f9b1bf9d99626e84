use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(1);

/// Tumbling one-second window over completed inferences.
///
/// Windows are half-open, `[start, start + 1s)`, and laid on a fixed grid
/// anchored at the first completion. A completion landing exactly on a
/// boundary belongs to the next window. With steady model latency this keeps
/// the rate at or below the frame cap; it drops lower whenever the model is
/// slower than the cap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThroughputMeter {
    pub frame_counter: u32,
    pub window_start: Option<Duration>,
    observed: Option<u32>,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close every window that ended at or before `now`. Windows that passed
    /// with no completions count as 0. Returns the rate of the most recent
    /// window closed by this call.
    pub fn advance(&mut self, now: Duration) -> Option<u32> {
        let start = self.window_start?;
        let elapsed = now.checked_sub(start)?;
        let closed = elapsed.as_nanos() / WINDOW.as_nanos();
        if closed == 0 {
            return None;
        }
        let rate = if closed == 1 { self.frame_counter } else { 0 };
        self.frame_counter = 0;
        self.window_start = Some(start + WINDOW * closed as u32);
        self.observed = Some(rate);
        Some(rate)
    }

    /// Count one completed inference at `now`. Returns the rate when this
    /// completion closes a window; the completion itself opens the next one.
    pub fn record(&mut self, now: Duration) -> Option<u32> {
        let closed = self.advance(now);
        self.window_start.get_or_insert(now);
        self.frame_counter += 1;
        closed
    }

    /// Rate emitted by the last closed window.
    pub fn observed(&self) -> Option<u32> {
        self.observed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
