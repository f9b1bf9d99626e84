use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use teachable_lens::config::OverlaySettings;
use teachable_lens::overlay::{CoordinateMapper, CoverFit};
use teachable_lens::{BoundingBox, LensError, Size};

#[test]
fn cover_fit_reference_case() {
    let source = Size::new(640.0, 480.0);
    let container = Size::new(800.0, 450.0);

    let fit = CoverFit::new(source, container).unwrap();
    assert_eq!(fit.scale, 1.25);
    assert_eq!(fit.offset_x, 0.0);
    assert_eq!(fit.offset_y, -75.0);

    let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
    let raw = fit.project(&bbox);
    assert_eq!(raw.x, 125.0);
    assert_eq!(raw.y, 50.0);
    assert_eq!(raw.width, 62.5);
    assert_eq!(raw.height, 62.5);

    let display = CoordinateMapper::default()
        .map(&bbox, source, container)
        .unwrap();
    assert_eq!(display.left, 125.0);
    assert_eq!(display.top, 50.0);
    assert_eq!(display.width, 62.5);
    assert_eq!(display.height, 62.5);
    assert_eq!(display.max_width, 665.0);
    assert_eq!(display.max_height, 390.0);
    assert!(display.label_above);
}

#[test]
fn box_near_top_edge_gets_inside_label_and_margin() {
    let source = Size::new(640.0, 480.0);
    let container = Size::new(800.0, 450.0);
    // y = 40 maps to raw top -25, which clamps to the margin.
    let display = CoordinateMapper::default()
        .map(&BoundingBox::new(0.0, 40.0, 80.0, 40.0), source, container)
        .unwrap();
    assert_eq!(display.left, 10.0);
    assert_eq!(display.top, 10.0);
    assert!(!display.label_above);
}

#[test]
fn missing_geometry_is_unmappable() {
    let mapper = CoordinateMapper::default();
    let bbox = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
    for (source, container) in [
        (Size::new(0.0, 480.0), Size::new(800.0, 450.0)),
        (Size::new(640.0, 480.0), Size::default()),
        (Size::new(f32::NAN, 480.0), Size::new(800.0, 450.0)),
        (Size::new(640.0, 480.0), Size::new(20.0, 450.0)),
    ] {
        assert!(matches!(
            mapper.map(&bbox, source, container),
            Err(LensError::GeometryUnavailable(_))
        ));
    }
}

#[test]
fn clamped_boxes_stay_inside_margins() {
    let mut rng = StdRng::seed_from_u64(42);
    let eps = 1e-3;
    let mut mapped = 0;

    for _ in 0..10_000 {
        let margin = rng.gen_range(0.0f32..30.0);
        let mapper = CoordinateMapper::new(OverlaySettings {
            margin,
            ..OverlaySettings::default()
        });
        let source = Size::new(rng.gen_range(1.0..4000.0), rng.gen_range(1.0..4000.0));
        let container = Size::new(rng.gen_range(1.0..2500.0), rng.gen_range(1.0..2500.0));
        // Boxes may overflow the source on any side.
        let bbox = BoundingBox::new(
            rng.gen_range(-0.5..1.2) * source.width,
            rng.gen_range(-0.5..1.2) * source.height,
            rng.gen_range(0.0..1.5) * source.width,
            rng.gen_range(0.0..1.5) * source.height,
        );

        match mapper.map(&bbox, source, container) {
            Ok(d) => {
                mapped += 1;
                assert!(d.left >= margin, "left {} < margin {}", d.left, margin);
                assert!(d.top >= margin, "top {} < margin {}", d.top, margin);
                assert!(d.left + d.width <= container.width - margin + eps);
                assert!(d.top + d.height <= container.height - margin + eps);
                assert!(d.width <= d.max_width && d.height <= d.max_height);
                assert!(d.width >= 0.0 && d.height >= 0.0);
            }
            Err(LensError::GeometryUnavailable(_)) => {
                assert!(container.width <= 2.0 * margin || container.height <= 2.0 * margin);
            }
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert!(mapped > 9_000);
}
