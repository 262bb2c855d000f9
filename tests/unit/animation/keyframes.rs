use super::*;

fn slide() -> Keyframes {
    Keyframes::new(vec![
        Keyframe::translate(1.0, 100.0, 0.0),
        Keyframe::translate(0.0, 0.0, 0.0),
    ])
    .unwrap()
}

#[test]
fn new_sorts_by_time() {
    let k = slide();
    assert_eq!(k.as_slice()[0].time_s, 0.0);
    assert_eq!(k.as_slice()[1].time_s, 1.0);
}

#[test]
fn linear_midpoint_and_holds_outside_range() {
    let k = slide();
    assert_eq!(k.sample(0.5).delta.x, 50.0);
    assert_eq!(k.sample(-1.0).delta.x, 0.0);
    assert_eq!(k.sample(2.0).delta.x, 100.0);
    assert_eq!(k.sample(2.0).delta.y, 0.0);
}

#[test]
fn empty_track_is_neutral() {
    assert_eq!(Keyframes::none().sample(3.0), KeyframeSample::NEUTRAL);
}

#[test]
fn rotation_takes_shortest_arc() {
    let k = Keyframes::new(vec![
        Keyframe::translate(0.0, 0.0, 0.0).with_delta(Transform2D::new(0.0, 0.0, 1.0, 1.0, 350.0)),
        Keyframe::translate(1.0, 0.0, 0.0).with_delta(Transform2D::new(0.0, 0.0, 1.0, 1.0, 10.0)),
    ])
    .unwrap();
    let mid = k.sample(0.5).delta.rotation_deg;
    assert!((normalize_angle(mid) - 0.0).abs() < 1e-9, "got {mid}");
}

#[test]
fn ease_shapes_the_segment_it_starts() {
    let k = Keyframes::new(vec![
        Keyframe::translate(0.0, 0.0, 0.0).with_ease(Ease::Hold),
        Keyframe::translate(1.0, 100.0, 0.0),
    ])
    .unwrap();
    assert_eq!(k.sample(0.9).delta.x, 0.0);
    assert_eq!(k.sample(1.0).delta.x, 100.0);
}

#[test]
fn deltas_combine_with_base() {
    let sample = KeyframeSample {
        delta: Transform2D::new(5.0, -5.0, 2.0, 0.5, 30.0),
        opacity: 0.5,
    };
    let base = Transform2D::new(10.0, 10.0, 1.5, 2.0, 340.0);
    let (t, op) = sample.apply_to(&base, 0.8);
    assert_eq!((t.x, t.y), (15.0, 5.0));
    assert_eq!((t.scale_x, t.scale_y), (3.0, 1.0));
    assert!((t.rotation_deg - 10.0).abs() < 1e-9);
    assert!((op - 0.4).abs() < 1e-12);
}

#[test]
fn duplicate_times_are_rejected() {
    let err = Keyframes::new(vec![
        Keyframe::translate(0.5, 0.0, 0.0),
        Keyframe::translate(0.5, 1.0, 0.0),
    ])
    .unwrap_err();
    assert!(matches!(err, LayerstackError::Validation(_)));
}

#[test]
fn opacity_defaults_to_one_when_deserialized() {
    let k: Keyframe = serde_json::from_str(r#"{"time_s": 0.25}"#).unwrap();
    assert_eq!(k.opacity, 1.0);
    assert_eq!(k.delta, Transform2D::IDENTITY);
    assert_eq!(k.ease, Ease::Linear);
}
