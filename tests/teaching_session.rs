use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use teachable_lens::session::{ExecMode, LogSink, ManualTicker, Ticker};
use teachable_lens::{
    ClassId, EmbeddingModel, FeatureVector, HistogramEmbedder, InputSource, LensConfig,
    LiveConfig, LiveSource, OnlineClassifier, StillImage, TeachingSession,
};

fn random_vector(rng: &mut StdRng, dims: usize) -> Vec<f32> {
    (0..dims).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

#[test]
fn identical_vector_wins_and_distribution_sums_to_one() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let dims = rng.gen_range(2..64);
        let mut classifier = OnlineClassifier::default();
        let classes: Vec<ClassId> = (0..rng.gen_range(2..6))
            .map(|i| classifier.declare_class(format!("class-{i}")))
            .collect();

        for &class in &classes {
            for _ in 0..rng.gen_range(0..4) {
                let v = FeatureVector::new(random_vector(&mut rng, dims));
                classifier.add_example(class, v).unwrap();
            }
        }
        let target = classes[rng.gen_range(0..classes.len())];
        let values = random_vector(&mut rng, dims);
        classifier
            .add_example(target, FeatureVector::new(values.clone()))
            .unwrap();

        let query = FeatureVector::new(values);
        let prediction = classifier.predict(&query).unwrap();
        let sum: f32 = prediction.scores().iter().map(|s| s.confidence).sum();
        assert!((sum - 1.0).abs() <= 1e-6, "sum {}", sum);

        let own = prediction.confidence(target).unwrap();
        for score in prediction.scores() {
            assert!(own >= score.confidence - 1e-6);
        }
    }
}

#[test]
fn empty_and_cleared_store_predict_empty() {
    let mut classifier = OnlineClassifier::default();
    let query = FeatureVector::new(vec![0.3, 0.4]);
    assert!(classifier.predict(&query).unwrap().is_empty());

    let a = classifier.declare_class("a");
    classifier
        .add_example(a, FeatureVector::new(vec![1.0, 0.0]))
        .unwrap();
    assert!(!classifier.predict(&query).unwrap().is_empty());

    classifier.clear_all();
    assert!(classifier.predict(&query).unwrap().is_empty());
    assert_eq!(classifier.store().total(), 0);
}

#[test]
fn query_vectors_are_released_and_exemplars_retained() {
    let mut embedder = HistogramEmbedder::new();
    let tracker = embedder.tracker();
    let mut classifier = OnlineClassifier::default();
    let a = classifier.declare_class("a");

    let frame = StillImage::synthetic(16, 16, 2);
    let mut frame_source = InputSource::image(frame);
    for _ in 0..3 {
        let frame = frame_source.capture().unwrap();
        classifier.add_example(a, embedder.embed(&frame).unwrap()).unwrap();
    }
    for _ in 0..10 {
        let frame = frame_source.capture().unwrap();
        let query = embedder.embed(&frame).unwrap();
        classifier.predict(&query).unwrap();
    }
    assert_eq!(tracker.live(), classifier.store().total());

    classifier.clear_all();
    assert_eq!(tracker.live(), 0);
}

#[test]
fn live_teaching_session_end_to_end() {
    let embedder = HistogramEmbedder::new();
    let tracker = embedder.tracker();
    let mut config = LensConfig::default();
    config.frame_cap_hz = 30.0;
    let mut session = TeachingSession::new(embedder, &config, ExecMode::Background).unwrap();
    session.start().unwrap();

    let bright = session.declare_class("bright").unwrap();
    let dark = session.declare_class("dark").unwrap();
    session.attach(InputSource::image(StillImage::synthetic(48, 36, 0)));
    session.capture_example(bright).unwrap();
    session.attach(InputSource::image(StillImage::synthetic(48, 36, 5)));
    session.capture_example(dark).unwrap();

    let mut live = LiveSource::new(LiveConfig {
        url: "stub://teach".into(),
        width: 48,
        height: 36,
    })
    .unwrap();
    live.connect().unwrap();
    session.attach(InputSource::live(live));

    let mut sink = LogSink::default();
    let mut ticker = ManualTicker::new(Duration::from_millis(16));
    for _ in 0..120 {
        let now = ticker.next_tick();
        session.tick(now, &mut sink);
        if session.scheduler().in_flight().is_some() {
            session.wait_for_outcome(now, Duration::from_secs(5), &mut sink);
        }
    }

    assert!(sink.prediction_updates > 10);
    let prediction = session.prediction();
    assert_eq!(prediction.scores().len(), 2);
    let sum: f32 = prediction.scores().iter().map(|s| s.confidence).sum();
    assert!((sum - 1.0).abs() <= 1e-6);

    let counts = session.class_counts().unwrap();
    assert_eq!(counts.iter().map(|c| c.examples).sum::<usize>(), 2);

    session.shutdown();
    assert!(session.prediction().is_empty());
    assert_eq!(tracker.live(), 2);
}
