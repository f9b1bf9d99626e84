use std::time::Duration;

use teachable_lens::session::{ManualTicker, Ticker};
use teachable_lens::{
    ClipConfig, ClipSource, DetectionSession, ExecMode, InputSource, LensConfig, LogSink,
    OverlayItem, Prediction, ResultsSink, Size, StubDetector,
};

#[derive(Default)]
struct Recorder {
    frames: Vec<Vec<OverlayItem>>,
    rates: Vec<u32>,
}

impl ResultsSink for Recorder {
    fn detections(&mut self, items: &[OverlayItem]) {
        self.frames.push(items.to_vec());
    }

    fn prediction(&mut self, _prediction: &Prediction) {}

    fn throughput(&mut self, per_second: u32) {
        self.rates.push(per_second);
    }
}

fn playing_clip() -> InputSource {
    let clip = ClipSource::new(ClipConfig {
        frame_count: 24,
        width: 160,
        height: 120,
        ..ClipConfig::default()
    })
    .unwrap();
    let mut source = InputSource::video(clip);
    source.set_playing(true);
    source
}

#[test]
fn failing_cycles_do_not_stop_the_loop() {
    let mut config = LensConfig::default();
    config.frame_cap_hz = 20.0;
    let mut session =
        DetectionSession::new(StubDetector::new().failing_every(3), &config, ExecMode::Inline)
            .unwrap();
    session.start().unwrap();
    session.set_container(Size::new(640.0, 360.0));
    session.attach(playing_clip());

    let mut sink = Recorder::default();
    let mut ticker = ManualTicker::new(Duration::from_millis(10));
    for _ in 0..300 {
        session.tick(ticker.next_tick(), &mut sink);
    }

    // 3 s at 20 Hz, one in three cycles failing.
    assert!(sink.frames.len() >= 55, "{} cycles", sink.frames.len());
    let empty = sink.frames.iter().filter(|f| f.is_empty()).count();
    assert!(empty >= sink.frames.len() / 3 - 1);
    assert!(sink.frames.iter().any(|f| f.iter().any(|i| i.label == "marker")));
    assert!(!sink.rates.is_empty());
    assert!(sink.rates.iter().all(|&r| r <= 20), "rates {:?}", sink.rates);
}

#[test]
fn background_session_pauses_and_resumes() {
    let mut config = LensConfig::default();
    config.frame_cap_hz = 50.0;
    let mut session =
        DetectionSession::new(StubDetector::new(), &config, ExecMode::Background).unwrap();
    session.start().unwrap();
    session.set_container(Size::new(320.0, 240.0));
    session.attach(playing_clip());

    let mut sink = LogSink::default();
    let mut ticker = ManualTicker::new(Duration::from_millis(16));
    let mut drive = |session: &mut DetectionSession<StubDetector>, sink: &mut LogSink, n: usize| {
        for _ in 0..n {
            let now = ticker.next_tick();
            session.tick(now, sink);
            if session.scheduler().in_flight().is_some() {
                session.wait_for_outcome(now, Duration::from_secs(5), sink);
            }
        }
    };

    drive(&mut session, &mut sink, 30);
    let before_pause = sink.detection_updates;
    assert!(before_pause > 5);

    session.pause();
    drive(&mut session, &mut sink, 30);
    assert_eq!(sink.detection_updates, before_pause);

    session.resume();
    drive(&mut session, &mut sink, 30);
    assert!(sink.detection_updates > before_pause);
    assert!(!session.overlay().is_empty());

    session.shutdown();
}
