//! Inference scheduling.
//!
//! `FrameScheduler` is a cooperative state machine driven by an external tick
//! (display refresh, timer). Each `step(now)` either does nothing, or hands
//! the caller one `PendingInference` to run against a model. The caller
//! reports the outcome with `complete(ticket, ..)`.
//!
//! Guarantees:
//! - At most one inference is outstanding per scheduler. Ticks that arrive
//!   while one is outstanding return `Step::Busy`.
//! - Inferences are issued at least `1 / frame_cap_hz` apart.
//! - Every request is tagged with the epoch active when it was issued.
//!   Pausing, switching source and detaching bump the epoch; results from an
//!   older epoch are discarded on arrival and never touch the current state.
//! - A failed inference applies an empty result and the loop keeps going.
//!
//! The scheduler is generic over the applied result: detection lists for the
//! detection loop, class predictions for the teaching loop.

mod throughput;

use std::time::Duration;

use crate::config::validate_frame_cap;
use crate::error::LensError;
use crate::frame::{Frame, Size};
use crate::ingest::{InputSource, Mode, SourceKind};

pub use throughput::ThroughputMeter;

pub const DEFAULT_FRAME_CAP_HZ: f32 = 24.0;

/// Scheduler state visible to the session and the results sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerState {
    pub mode: Mode,
    pub source_kind: Option<SourceKind>,
    pub paused: bool,
    pub last_frame_at: Option<Duration>,
    pub epoch: u64,
    pub throughput: ThroughputMeter,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            mode: Mode::Live,
            source_kind: None,
            paused: false,
            last_frame_at: None,
            epoch: 0,
            throughput: ThroughputMeter::new(),
        }
    }
}

/// Identifies one issued inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
    pub issued_at: Duration,
}

/// Work handed out by `step`. The frame is released when this is dropped.
#[derive(Debug)]
pub struct PendingInference {
    pub ticket: Ticket,
    pub frame: Frame,
}

/// What a tick did.
#[derive(Debug)]
pub enum Step {
    /// Not armed: no source, paused, or the image's one-shot already ran.
    Idle,
    /// An inference is outstanding.
    Busy,
    /// Too soon after the previous due tick.
    Throttled,
    /// Due, but the source has no usable frame.
    NotReady,
    Issued(PendingInference),
}

impl Step {
    pub fn is_issued(&self) -> bool {
        matches!(self, Step::Issued(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// Issued under an older epoch, or not the outstanding request.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImageShot {
    NotImage,
    Pending,
    InFlight,
    Done,
}

pub struct FrameScheduler<R> {
    state: SchedulerState,
    source: Option<InputSource>,
    min_interval: Duration,
    in_flight: Option<Ticket>,
    /// Natural size of the source when the outstanding frame was captured.
    in_flight_size: Option<Size>,
    image_shot: ImageShot,
    next_seq: u64,
    latest: R,
    latest_size: Option<Size>,
    emitted_rate: Option<u32>,
}

impl<R: Default> FrameScheduler<R> {
    pub fn new(frame_cap_hz: f32) -> Result<Self, LensError> {
        Ok(Self {
            state: SchedulerState::default(),
            source: None,
            min_interval: min_interval(frame_cap_hz)?,
            in_flight: None,
            in_flight_size: None,
            image_shot: ImageShot::NotImage,
            next_seq: 0,
            latest: R::default(),
            latest_size: None,
            emitted_rate: None,
        })
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Change the cap without restarting the loop.
    pub fn set_frame_cap(&mut self, frame_cap_hz: f32) -> Result<(), LensError> {
        self.min_interval = min_interval(frame_cap_hz)?;
        log::info!("frame cap set to {} Hz", frame_cap_hz);
        Ok(())
    }

    /// Result applied by the most recent current-epoch completion.
    pub fn latest(&self) -> &R {
        &self.latest
    }

    /// Source size the latest result was computed against. Overlay mapping
    /// uses this rather than the current size so boxes and geometry agree.
    pub fn latest_source_size(&self) -> Option<Size> {
        self.latest_size
    }

    pub fn source(&self) -> Option<&InputSource> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut InputSource> {
        self.source.as_mut()
    }

    pub fn source_size(&self) -> Option<Size> {
        self.source.as_ref().and_then(InputSource::natural_size)
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// Whether ticks can lead to new work. Drivers may stop ticking while
    /// this is false and there is nothing outstanding.
    pub fn is_armed(&self) -> bool {
        self.source.is_some()
            && !self.state.paused
            && !matches!(self.image_shot, ImageShot::InFlight | ImageShot::Done)
    }

    /// Replace the active source. Clears the applied result and cancels
    /// anything issued against the previous source.
    pub fn attach(&mut self, source: InputSource) {
        self.bump_epoch();
        log::info!(
            "attached source {} ({:?}/{:?}), epoch {}",
            source.name(),
            source.mode(),
            source.kind(),
            self.state.epoch
        );
        self.state.mode = source.mode();
        self.state.source_kind = Some(source.kind());
        self.state.last_frame_at = None;
        self.state.throughput.reset();
        self.image_shot = match source.kind() {
            SourceKind::Image => ImageShot::Pending,
            SourceKind::Video => ImageShot::NotImage,
        };
        self.latest = R::default();
        self.latest_size = None;
        self.source = Some(source);
    }

    /// Drop the active source (session teardown or user removal).
    pub fn detach(&mut self) -> Option<InputSource> {
        self.bump_epoch();
        self.state.source_kind = None;
        self.state.last_frame_at = None;
        self.image_shot = ImageShot::NotImage;
        self.latest = R::default();
        self.latest_size = None;
        let source = self.source.take();
        if let Some(source) = &source {
            log::info!("detached source {}, epoch {}", source.name(), self.state.epoch);
        }
        source
    }

    /// Stop issuing work. An outstanding result will be discarded.
    pub fn pause(&mut self) {
        if self.state.paused {
            return;
        }
        self.state.paused = true;
        self.bump_epoch();
        if self.image_shot == ImageShot::InFlight {
            self.image_shot = ImageShot::Pending;
        }
        log::info!("scheduler paused, epoch {}", self.state.epoch);
    }

    pub fn resume(&mut self) {
        if !self.state.paused {
            return;
        }
        self.state.paused = false;
        log::info!("scheduler resumed, epoch {}", self.state.epoch);
    }

    /// Advance the loop for one tick at `now` (monotonic, session-relative).
    pub fn step(&mut self, now: Duration) -> Step {
        if let Some(rate) = self.state.throughput.advance(now) {
            self.emit_rate(rate);
        }
        if !self.is_armed() {
            return Step::Idle;
        }
        if self.in_flight.is_some() {
            return Step::Busy;
        }
        if let Some(last) = self.state.last_frame_at {
            if now.saturating_sub(last) < self.min_interval {
                return Step::Throttled;
            }
        }
        self.state.last_frame_at = Some(now);

        let Some(source) = self.source.as_mut() else {
            return Step::Idle;
        };
        if !source.is_ready() {
            log::trace!("source {} not ready", source.name());
            return Step::NotReady;
        }
        let source_size = source.natural_size();
        let frame = match source.capture() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("capture from {} failed: {:#}", source.name(), e);
                return Step::NotReady;
            }
        };

        let ticket = Ticket {
            epoch: self.state.epoch,
            seq: self.next_seq,
            issued_at: now,
        };
        self.next_seq += 1;
        self.in_flight = Some(ticket);
        self.in_flight_size = source_size;
        if self.image_shot == ImageShot::Pending {
            self.image_shot = ImageShot::InFlight;
        }
        Step::Issued(PendingInference { ticket, frame })
    }

    /// Report the outcome of an issued inference.
    ///
    /// Failures are logged and applied as an empty result.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<R, LensError>,
        now: Duration,
    ) -> Completion {
        match self.in_flight {
            Some(current) if current.seq == ticket.seq => {
                self.in_flight = None;
            }
            _ => {
                log::debug!("ignoring completion for unknown request {}", ticket.seq);
                return Completion::Discarded;
            }
        }
        let captured_size = self.in_flight_size.take();
        if ticket.epoch != self.state.epoch {
            log::debug!(
                "discarding result from epoch {} (current {})",
                ticket.epoch,
                self.state.epoch
            );
            return Completion::Discarded;
        }

        self.latest_size = captured_size;
        self.latest = match outcome {
            Ok(result) => result,
            Err(e) => {
                log::warn!("inference cycle skipped: {}", e);
                R::default()
            }
        };
        if self.image_shot == ImageShot::InFlight {
            self.image_shot = ImageShot::Done;
        }
        if let Some(rate) = self.state.throughput.record(now) {
            self.emit_rate(rate);
        }
        Completion::Applied
    }

    fn emit_rate(&mut self, rate: u32) {
        log::debug!("observed inference rate: {} per second", rate);
        self.emitted_rate = Some(rate);
    }

    /// Rate emitted by a throughput window that closed since the last call.
    pub fn take_observed_rate(&mut self) -> Option<u32> {
        self.emitted_rate.take()
    }

    /// Whatever the model is scoring against changed (e.g. new exemplars).
    /// Cancels the outstanding request and lets a mounted image run again.
    pub fn invalidate(&mut self, keep_latest: bool) {
        self.bump_epoch();
        if matches!(self.image_shot, ImageShot::InFlight | ImageShot::Done) {
            self.image_shot = ImageShot::Pending;
        }
        if !keep_latest {
            self.latest = R::default();
            self.latest_size = None;
        }
    }

    /// Capture a frame outside the loop, e.g. to teach an example.
    /// Does not count against pacing.
    pub fn capture_frame(&mut self) -> Result<Frame, LensError> {
        let source = self.source.as_mut().ok_or(LensError::NoSource)?;
        if !source.is_ready() {
            return Err(LensError::SourceNotReady(source.name().to_string()));
        }
        source.capture().map_err(LensError::inference)
    }

    fn bump_epoch(&mut self) {
        self.state.epoch += 1;
    }
}

fn min_interval(frame_cap_hz: f32) -> Result<Duration, LensError> {
    validate_frame_cap(frame_cap_hz).map_err(|e| LensError::InvalidSetting(e.to_string()))?;
    Ok(Duration::from_secs_f64(1.0 / frame_cap_hz as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ClipConfig, ClipSource, LiveConfig, LiveSource, StillImage};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn live() -> InputSource {
        let mut live = LiveSource::new(LiveConfig {
            url: "stub://test".into(),
            width: 8,
            height: 6,
        })
        .unwrap();
        live.connect().unwrap();
        InputSource::live(live)
    }

    /// Doubles its width on every capture.
    struct Resizing {
        width: u32,
    }

    impl crate::ingest::FrameSource for Resizing {
        fn name(&self) -> &str {
            "resizing"
        }

        fn ready_state(&self) -> crate::ingest::ReadyState {
            crate::ingest::ReadyState::HaveEnoughData
        }

        fn natural_size(&self) -> Option<Size> {
            Some(Size::new(self.width as f32, 6.0))
        }

        fn capture(&mut self) -> anyhow::Result<Frame> {
            let frame = Frame::from_rgb(vec![0; (self.width * 6 * 3) as usize], self.width, 6)?;
            self.width *= 2;
            Ok(frame)
        }
    }

    fn issued(step: Step) -> PendingInference {
        match step {
            Step::Issued(pending) => pending,
            other => panic!("expected issued step, got {:?}", other),
        }
    }

    #[test]
    fn default_cap_interval() {
        let scheduler = FrameScheduler::<Vec<u8>>::new(DEFAULT_FRAME_CAP_HZ).unwrap();
        let interval = scheduler.min_interval();
        assert!(interval > ms(41) && interval < ms(42));
        assert!(FrameScheduler::<Vec<u8>>::new(0.0).is_err());
    }

    #[test]
    fn idle_without_source() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(24.0).unwrap();
        assert!(matches!(scheduler.step(ms(0)), Step::Idle));
    }

    #[test]
    fn throttles_and_blocks_overlap() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(live());

        let first = issued(scheduler.step(ms(0)));
        assert!(matches!(scheduler.step(ms(200)), Step::Busy));
        assert_eq!(
            scheduler.complete(first.ticket, Ok(vec![1]), ms(210)),
            Completion::Applied
        );
        assert_eq!(scheduler.latest(), &vec![1]);

        assert!(matches!(scheduler.step(ms(50)), Step::Throttled));
        let second = issued(scheduler.step(ms(250)));
        assert!(second.ticket.issued_at - first.ticket.issued_at >= scheduler.min_interval());
    }

    #[test]
    fn failed_cycle_applies_empty_result_and_continues() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(live());
        let a = issued(scheduler.step(ms(0)));
        scheduler.complete(a.ticket, Ok(vec![9]), ms(10));
        let b = issued(scheduler.step(ms(100)));
        let done = scheduler.complete(
            b.ticket,
            Err(LensError::InferenceFailure("boom".into())),
            ms(110),
        );
        assert_eq!(done, Completion::Applied);
        assert!(scheduler.latest().is_empty());
        assert!(scheduler.step(ms(200)).is_issued());
    }

    #[test]
    fn pause_discards_in_flight_result() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(live());
        let pending = issued(scheduler.step(ms(0)));
        scheduler.pause();
        assert!(matches!(scheduler.step(ms(500)), Step::Idle));
        assert_eq!(
            scheduler.complete(pending.ticket, Ok(vec![5]), ms(520)),
            Completion::Discarded
        );
        assert!(scheduler.latest().is_empty());

        scheduler.resume();
        assert!(scheduler.step(ms(600)).is_issued());
    }

    #[test]
    fn image_runs_exactly_once() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(InputSource::image(StillImage::synthetic(4, 4, 0)));
        let shot = issued(scheduler.step(ms(0)));
        assert!(!scheduler.is_armed());
        scheduler.complete(shot.ticket, Ok(vec![3]), ms(30));
        for t in 1..20 {
            assert!(matches!(scheduler.step(ms(t * 100)), Step::Idle));
        }
        assert_eq!(scheduler.latest(), &vec![3]);

        scheduler.attach(InputSource::image(StillImage::synthetic(4, 4, 1)));
        assert!(scheduler.latest().is_empty());
        assert!(scheduler.step(ms(5000)).is_issued());
    }

    #[test]
    fn image_shot_reruns_after_pause_discard() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(InputSource::image(StillImage::synthetic(4, 4, 0)));
        let shot = issued(scheduler.step(ms(0)));
        scheduler.pause();
        scheduler.complete(shot.ticket, Ok(vec![1]), ms(10));
        scheduler.resume();
        let rerun = issued(scheduler.step(ms(200)));
        assert_eq!(
            scheduler.complete(rerun.ticket, Ok(vec![2]), ms(210)),
            Completion::Applied
        );
        assert_eq!(scheduler.latest(), &vec![2]);
    }

    #[test]
    fn paused_video_is_not_ready() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        let clip = ClipSource::new(ClipConfig {
            frame_count: 2,
            width: 4,
            height: 4,
            ..ClipConfig::default()
        })
        .unwrap();
        scheduler.attach(InputSource::video(clip));
        assert!(matches!(scheduler.step(ms(0)), Step::NotReady));
        scheduler.source_mut().unwrap().set_playing(true);
        assert!(matches!(scheduler.step(ms(50)), Step::Throttled));
        assert!(scheduler.step(ms(100)).is_issued());
    }

    #[test]
    fn invalidate_reruns_image_and_discards_in_flight() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(InputSource::image(StillImage::synthetic(4, 4, 0)));
        let shot = issued(scheduler.step(ms(0)));
        scheduler.complete(shot.ticket, Ok(vec![1]), ms(5));
        assert!(!scheduler.is_armed());

        scheduler.invalidate(true);
        assert_eq!(scheduler.latest(), &vec![1]);
        let again = issued(scheduler.step(ms(100)));
        scheduler.invalidate(false);
        assert!(scheduler.latest().is_empty());
        assert_eq!(
            scheduler.complete(again.ticket, Ok(vec![2]), ms(110)),
            Completion::Discarded
        );
        assert!(scheduler.step(ms(200)).is_issued());
    }

    #[test]
    fn capture_frame_needs_ready_source() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        assert!(matches!(scheduler.capture_frame(), Err(LensError::NoSource)));
        let clip = ClipSource::new(ClipConfig {
            frame_count: 1,
            width: 2,
            height: 2,
            ..ClipConfig::default()
        })
        .unwrap();
        scheduler.attach(InputSource::video(clip));
        assert!(matches!(
            scheduler.capture_frame(),
            Err(LensError::SourceNotReady(_))
        ));
        scheduler.source_mut().unwrap().set_playing(true);
        assert_eq!(scheduler.capture_frame().unwrap().width, 2);
    }

    #[test]
    fn observed_rate_is_handed_out_once() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(240.0).unwrap();
        scheduler.attach(live());
        for t in 0..=20u64 {
            let pending = issued(scheduler.step(ms(t * 50)));
            scheduler.complete(pending.ticket, Ok(Vec::new()), ms(t * 50 + 1));
        }
        // 20 Hz loop; the completion at 1001 ms opens the second window.
        assert_eq!(scheduler.take_observed_rate(), Some(20));
        assert_eq!(scheduler.take_observed_rate(), None);
        assert_eq!(scheduler.state().throughput.observed(), Some(20));
    }

    #[test]
    fn stalled_model_reports_zero_rate() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(live());
        let mut stalled = None;
        let mut rates = Vec::new();
        for t in (0..5000u64).step_by(100) {
            if let Step::Issued(pending) = scheduler.step(ms(t)) {
                if t < 1000 {
                    scheduler.complete(pending.ticket, Ok(Vec::new()), ms(t));
                } else {
                    stalled = Some(pending.ticket);
                }
            }
            rates.extend(scheduler.take_observed_rate());
        }
        assert!(stalled.is_some());
        assert!(matches!(scheduler.step(ms(5000)), Step::Busy));
        rates.extend(scheduler.take_observed_rate());
        assert_eq!(rates, vec![10, 0, 0, 0, 0]);
        assert_eq!(scheduler.state().throughput.observed(), Some(0));
    }

    #[test]
    fn paused_loop_reports_zero_rate() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(live());
        let pending = issued(scheduler.step(ms(0)));
        scheduler.complete(pending.ticket, Ok(Vec::new()), ms(0));
        scheduler.pause();
        assert!(matches!(scheduler.step(ms(1000)), Step::Idle));
        assert_eq!(scheduler.take_observed_rate(), Some(1));
        assert!(matches!(scheduler.step(ms(2000)), Step::Idle));
        assert_eq!(scheduler.take_observed_rate(), Some(0));
    }

    #[test]
    fn applied_result_keeps_issue_time_geometry() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(10.0).unwrap();
        scheduler.attach(InputSource::live(Resizing { width: 8 }));
        assert_eq!(scheduler.latest_source_size(), None);

        let pending = issued(scheduler.step(ms(0)));
        assert_eq!(scheduler.source_size(), Some(Size::new(16.0, 6.0)));
        scheduler.complete(pending.ticket, Ok(vec![1]), ms(10));
        assert_eq!(scheduler.latest_source_size(), Some(Size::new(8.0, 6.0)));

        scheduler.invalidate(false);
        assert_eq!(scheduler.latest_source_size(), None);
    }

    #[test]
    fn set_frame_cap_validates() {
        let mut scheduler = FrameScheduler::<Vec<u8>>::new(24.0).unwrap();
        assert!(matches!(
            scheduler.set_frame_cap(-1.0),
            Err(LensError::InvalidSetting(_))
        ));
        scheduler.set_frame_cap(5.0).unwrap();
        assert_eq!(scheduler.min_interval(), ms(200));
    }
}
